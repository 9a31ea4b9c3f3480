use std::time::Duration;

use ledger_core::config::{env_duration, env_string};
use ledger_core::Result;

/// Polling and cache-eviction cadence for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// How far back each polling cycle looks. Over-fetch is cheap because of
    /// duplicate suppression; size this generously (hours) so short outages
    /// are absorbed.
    pub lookback_window: Duration,
    pub polling_interval: Duration,
    pub cleanup_interval: Duration,
    pub assets_file: String,
}

impl ReconcilerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            lookback_window: env_duration("LISTENER_LOOKBACK_WINDOW", Duration::from_secs(6 * 3600))?,
            polling_interval: env_duration("LISTENER_POLLING_INTERVAL", Duration::from_secs(30))?,
            cleanup_interval: env_duration("LISTENER_CLEANUP_INTERVAL", Duration::from_secs(15 * 60))?,
            assets_file: env_string("ASSETS_FILE", "assets.json"),
        })
    }

    pub(crate) fn lookback_chrono(&self) -> chrono::Duration {
        let millis = self.lookback_window.as_millis().min(i64::MAX as u128);
        chrono::Duration::milliseconds(millis as i64)
    }
}

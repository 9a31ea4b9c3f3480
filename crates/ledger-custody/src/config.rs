use std::time::Duration;

use ledger_core::config::{env_duration, env_required, env_string};
use ledger_core::Result;

/// Connection settings for the custody/brokerage API. The credential values
/// are opaque to the core; they are forwarded as headers.
#[derive(Debug, Clone)]
pub struct CustodyConfig {
    pub base_url: String,
    pub access_key: String,
    pub passphrase: String,
    pub signing_key: String,
    pub rpc_timeout: Duration,
}

impl CustodyConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            base_url: env_required("CUSTODY_BASE_URL")?,
            access_key: env_required("CUSTODY_ACCESS_KEY")?,
            passphrase: env_required("CUSTODY_PASSPHRASE")?,
            signing_key: env_required("CUSTODY_SIGNING_KEY")?,
            rpc_timeout: env_duration("CUSTODY_RPC_TIMEOUT", Duration::from_secs(30))?,
        })
    }

    /// Variant used by local tooling against a stub endpoint.
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            access_key: env_string("CUSTODY_ACCESS_KEY", "test"),
            passphrase: env_string("CUSTODY_PASSPHRASE", "test"),
            signing_key: env_string("CUSTODY_SIGNING_KEY", "test"),
            rpc_timeout: Duration::from_secs(30),
        }
    }
}

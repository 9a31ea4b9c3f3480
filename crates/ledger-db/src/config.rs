use std::time::Duration;

use ledger_core::config::{env_duration, env_string, env_u32};
use ledger_core::Result;

/// Connection policy for the embedded store.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_open_conns: u32,
    pub min_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
    pub ping_timeout: Duration,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            path: env_string("DATABASE_PATH", "addresses.db"),
            max_open_conns: env_u32("DB_MAX_OPEN_CONNS", 25),
            min_idle_conns: env_u32("DB_MAX_IDLE_CONNS", 5),
            conn_max_lifetime: env_duration("DB_CONN_MAX_LIFETIME", Duration::from_secs(300))?,
            conn_max_idle_time: env_duration("DB_CONN_MAX_IDLE_TIME", Duration::from_secs(30))?,
            ping_timeout: env_duration("DB_PING_TIMEOUT", Duration::from_secs(5))?,
        })
    }
}

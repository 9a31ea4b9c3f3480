pub mod attribution;
pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
pub mod repositories;
pub mod subledger;

pub use attribution::Attribution;
pub use config::DatabaseConfig;
pub use pool::DatabasePool;
pub use subledger::Subledger;

use ledger_core::LedgerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection error: {0}")]
    Connection(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("schema error: {0}")]
    Schema(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Query(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

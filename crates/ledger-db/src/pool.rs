use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::{queries, Result, StoreError};

/// Bounded connection pool over the embedded SQLite store.
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens the database file, applies the connection policy, and verifies
    /// liveness with a bounded ping.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!(
            path = %config.path,
            max_open_conns = config.max_open_conns,
            min_idle_conns = config.min_idle_conns,
            "Opening SQLite database"
        );

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.min_idle_conns)
            .max_lifetime(config.conn_max_lifetime)
            .idle_timeout(config.conn_max_idle_time)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tokio::time::timeout(config.ping_timeout, sqlx::query("SELECT 1").execute(&pool))
            .await
            .map_err(|_| {
                StoreError::Connection(format!(
                    "ping timed out after {:?}",
                    config.ping_timeout
                ))
            })?
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// In-memory database on a single connection. SQLite scopes `:memory:`
    /// per connection, so the pool must not grow past one.
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Applies the idempotent schema.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::raw_sql(queries::SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        info!("Schema initialized");
        Ok(())
    }

    pub fn inner(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        info!("Closing database connection pool");
        self.pool.close().await;
    }
}

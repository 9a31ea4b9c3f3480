use chrono::Utc;
use ledger_core::time::format_store_timestamp;
use ledger_core::types::User;
use ledger_core::{LedgerError, Result};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::models::UserRow;
use crate::{queries, StoreError};

pub struct UserRepository;

impl UserRepository {
    /// Creates a user with a fresh UUID.
    pub async fn insert(pool: &SqlitePool, name: &str, email: &str) -> Result<User> {
        let id = Uuid::new_v4().to_string();
        Self::insert_with_id(pool, &id, name, email).await
    }

    /// Creates a user with a caller-supplied id.
    ///
    /// The first `-`-separated segment of the id doubles as the withdrawal
    /// attribution prefix, so it must be unique across all users; a collision
    /// is rejected here rather than discovered as a misattribution later.
    pub async fn insert_with_id(
        pool: &SqlitePool,
        id: &str,
        name: &str,
        email: &str,
    ) -> Result<User> {
        let prefix = id.split('-').next().unwrap_or(id);
        let taken: Option<(String,)> = sqlx::query_as(queries::CHECK_USER_ID_PREFIX)
            .bind(format!("{}-%", prefix))
            .fetch_optional(pool)
            .await
            .map_err(StoreError::from)?;
        if taken.is_some() {
            return Err(LedgerError::IdempotencyPrefixCollision(prefix.to_string()));
        }

        let now = Utc::now();
        let stamp = format_store_timestamp(now);
        sqlx::query(queries::INSERT_USER)
            .bind(id)
            .bind(name)
            .bind(email)
            .bind(&stamp)
            .bind(&stamp)
            .execute(pool)
            .await
            .map_err(StoreError::from)?;

        debug!(user_id = %id, name = %name, "User created");
        Ok(User {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub async fn get_active(pool: &SqlitePool) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(queries::GET_ACTIVE_USERS)
            .fetch_all(pool)
            .await
            .map_err(StoreError::from)?;
        rows.into_iter().map(User::try_from).collect()
    }

    pub async fn get_by_id(pool: &SqlitePool, user_id: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(queries::GET_USER_BY_ID)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => User::try_from(row),
            None => Err(LedgerError::UserNotFound(user_id.to_string())),
        }
    }

    pub async fn get_by_email(pool: &SqlitePool, email: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(queries::GET_USER_BY_EMAIL)
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => User::try_from(row),
            None => Err(LedgerError::UserNotFound(email.to_string())),
        }
    }
}

//! Maps external artifacts back to internal users: deposit addresses for
//! credits, idempotency-key prefixes for debits.

use sqlx::SqlitePool;
use tracing::debug;

use ledger_core::types::{Address, User};
use ledger_core::{LedgerError, Result};

use crate::models::UserAddressRow;
use crate::pool::DatabasePool;
use crate::repositories::UserRepository;
use crate::{queries, StoreError};

pub struct Attribution {
    pool: SqlitePool,
}

impl Attribution {
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.inner().clone(),
        }
    }

    /// Resolves the owner of a deposit by its lookup key, matching either
    /// `account_identifier` or the printable address. Only active users
    /// attribute.
    pub async fn find_user_by_address(&self, lookup: &str) -> Result<(User, Address)> {
        let row: Option<UserAddressRow> = sqlx::query_as(queries::FIND_USER_BY_ADDRESS)
            .bind(lookup)
            .bind(lookup)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let Some(row) = row else {
            debug!(lookup = %lookup, "No active user found for address");
            return Err(LedgerError::AddressNotFound(lookup.to_string()));
        };

        let (user, address): (User, Address) = row.try_into()?;
        debug!(lookup = %lookup, user_id = %user.id, "Found user by address");
        Ok((user, address))
    }

    /// Recovers the owner of an outgoing transfer from its idempotency key:
    /// the key's first `-`-separated segment equals the first segment of the
    /// owning user's id. User creation guarantees that segment is unique.
    pub async fn find_user_by_idempotency_key_prefix(&self, key: &str) -> Result<String> {
        if key.is_empty() {
            return Err(LedgerError::UserNotFound("empty idempotency key".into()));
        }
        let prefix = key.split('-').next().unwrap_or(key);

        let users = UserRepository::get_active(&self.pool).await?;
        for user in users {
            if user.id.split('-').next() == Some(prefix) {
                debug!(
                    user_id = %user.id,
                    idempotency_key = %key,
                    matched_prefix = %prefix,
                    "Matched withdrawal to user by id prefix"
                );
                return Ok(user.id);
            }
        }

        Err(LedgerError::UserNotFound(format!(
            "idempotency key prefix {prefix}"
        )))
    }
}

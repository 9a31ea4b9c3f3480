use chrono::Utc;
use ledger_core::time::format_store_timestamp;
use ledger_core::types::Address;
use ledger_core::Result;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::models::AddressRow;
use crate::{queries, StoreError};

pub struct AddressRepository;

impl AddressRepository {
    /// Records a custody-issued deposit address for a user.
    pub async fn insert(
        pool: &SqlitePool,
        user_id: &str,
        asset: &str,
        network: &str,
        address: &str,
        wallet_id: &str,
        account_identifier: &str,
    ) -> Result<Address> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(queries::INSERT_ADDRESS)
            .bind(&id)
            .bind(user_id)
            .bind(asset)
            .bind(network)
            .bind(address)
            .bind(wallet_id)
            .bind(account_identifier)
            .bind(format_store_timestamp(now))
            .execute(pool)
            .await
            .map_err(StoreError::from)?;

        debug!(address_id = %id, user_id = %user_id, asset = %asset, "Address stored");
        Ok(Address {
            id,
            user_id: user_id.to_string(),
            asset: asset.to_string(),
            network: network.to_string(),
            address: address.to_string(),
            wallet_id: wallet_id.to_string(),
            account_identifier: account_identifier.to_string(),
            created_at: now,
        })
    }

    /// All addresses for (user, asset, network), most recent first.
    pub async fn list_for_user_asset(
        pool: &SqlitePool,
        user_id: &str,
        asset: &str,
        network: &str,
    ) -> Result<Vec<Address>> {
        let rows: Vec<AddressRow> = sqlx::query_as(queries::GET_USER_ADDRESSES)
            .bind(user_id)
            .bind(asset)
            .bind(network)
            .fetch_all(pool)
            .await
            .map_err(StoreError::from)?;
        rows.into_iter().map(Address::try_from).collect()
    }
}

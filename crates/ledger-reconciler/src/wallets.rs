use std::collections::HashMap;

use tracing::{info, warn};

use ledger_core::types::WalletInfo;
use ledger_core::{AssetCatalog, Result};
use ledger_db::repositories::{AddressRepository, UserRepository};
use ledger_db::DatabasePool;

/// Builds the monitored-wallet set from the address inventory, filtered by
/// the asset catalog. Loaded once at start; wallets minted mid-run are picked
/// up on the next process start.
pub async fn load_monitored_wallets(
    pool: &DatabasePool,
    catalog: &AssetCatalog,
) -> Result<Vec<WalletInfo>> {
    let users = UserRepository::get_active(pool.inner()).await?;

    let mut wallets: HashMap<String, WalletInfo> = HashMap::new();
    for user in &users {
        for asset in &catalog.assets {
            let addresses = match AddressRepository::list_for_user_asset(
                pool.inner(),
                &user.id,
                &asset.symbol,
                &asset.network,
            )
            .await
            {
                Ok(addresses) => addresses,
                Err(e) => {
                    warn!(
                        user_id = %user.id,
                        symbol = %asset.symbol,
                        network = %asset.network,
                        error = %e,
                        "Failed to load addresses for user/asset"
                    );
                    continue;
                }
            };

            for address in addresses {
                if address.wallet_id.is_empty() {
                    continue;
                }
                wallets.insert(
                    address.wallet_id.clone(),
                    WalletInfo {
                        id: address.wallet_id,
                        asset: address.asset,
                        network: address.network,
                    },
                );
            }
        }
    }

    let wallets: Vec<WalletInfo> = wallets.into_values().collect();
    info!(count = wallets.len(), "Loaded monitored wallets");
    Ok(wallets)
}

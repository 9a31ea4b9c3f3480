use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ledger_core::Result;

use crate::types::{DepositAddress, Wallet, WalletTransaction, WithdrawalActivity};

/// The custody operations the core consumes. The reconciler and the
/// withdrawal initiator are written against this seam so tests can script
/// custody behavior.
#[async_trait]
pub trait CustodyApi: Send + Sync {
    async fn list_wallets(
        &self,
        portfolio_id: &str,
        wallet_type: &str,
        symbols: &[String],
    ) -> Result<Vec<Wallet>>;

    async fn create_wallet(
        &self,
        portfolio_id: &str,
        name: &str,
        symbol: &str,
        wallet_type: &str,
    ) -> Result<Wallet>;

    async fn create_deposit_address(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        symbol: &str,
        network: &str,
    ) -> Result<DepositAddress>;

    /// Transactions for one wallet since the given watermark, bounded to a
    /// single page of up to 500 entries.
    async fn list_wallet_transactions(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>>;

    async fn create_withdrawal(
        &self,
        portfolio_id: &str,
        wallet_id: &str,
        destination: &str,
        amount: &str,
        asset: &str,
        idempotency_key: &str,
    ) -> Result<WithdrawalActivity>;
}

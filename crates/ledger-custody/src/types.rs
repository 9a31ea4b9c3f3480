use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Terminal status for incoming transfers; anything else is not yet final.
pub const STATUS_DEPOSIT_FINAL: &str = "TRANSACTION_IMPORTED";
/// Terminal status for outgoing transfers.
pub const STATUS_WITHDRAWAL_FINAL: &str = "TRANSACTION_DONE";

pub const TYPE_DEPOSIT: &str = "DEPOSIT";
pub const TYPE_WITHDRAWAL: &str = "WITHDRAWAL";

#[derive(Debug, Clone, Deserialize)]
pub struct Wallet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub symbol: String,
    #[serde(rename = "type", default)]
    pub wallet_type: String,
}

/// Counterparty details on a wallet transaction. Memo- and tag-based chains
/// carry the routing identifier in `account_identifier`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferTo {
    #[serde(rename = "type", default)]
    pub transfer_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub account_identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    #[serde(default)]
    pub wallet_id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub status: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub network: String,
    pub amount: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub idempotency_key: String,
    #[serde(default)]
    pub transfer_to: Option<TransferTo>,
}

impl WalletTransaction {
    /// The deposit-attribution key: `account_identifier` when present,
    /// otherwise the printable address. Empty when the transaction carries no
    /// usable counterparty.
    pub fn deposit_lookup_key(&self) -> &str {
        match &self.transfer_to {
            Some(to) if !to.account_identifier.is_empty() => &to.account_identifier,
            Some(to) => &to.address,
            None => "",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletsPage {
    #[serde(default)]
    pub wallets: Vec<Wallet>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepositAddress {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawalActivity {
    pub activity_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub destination: String,
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Builds the ledger asset key for a (symbol, network) pair.
///
/// The whole instance keys balances and transactions by `SYMBOL-network`
/// (e.g. `ETH-ethereum-mainnet`). Addresses carry symbol and network as
/// separate columns; everything that talks to the subledger normalizes
/// through this function first.
pub fn asset_key(symbol: &str, network: &str) -> String {
    format!("{}-{}", symbol, network)
}

/// Splits an asset key back into (symbol, network).
pub fn split_asset_key(key: &str) -> Result<(&str, &str)> {
    match key.split_once('-') {
        Some((symbol, network)) if !symbol.is_empty() && !network.is_empty() => {
            Ok((symbol, network))
        }
        _ => Err(LedgerError::InvalidAssetKey(key.to_string())),
    }
}

/// Direction of a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            other => Err(LedgerError::InvalidConfig {
                key: "transaction_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Internal end user the subledger attributes funds to.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Custody-issued deposit address bound to one user and one (asset, network).
#[derive(Debug, Clone)]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub network: String,
    pub address: String,
    pub wallet_id: String,
    pub account_identifier: String,
    pub created_at: DateTime<Utc>,
}

impl Address {
    /// The key deposits are attributed by: `account_identifier` when the
    /// network carries a routing identifier distinct from the printable
    /// address, otherwise the address itself.
    pub fn lookup_key(&self) -> &str {
        if self.account_identifier.is_empty() {
            &self.address
        } else {
            &self.account_identifier
        }
    }
}

/// Current balance state for one (user, asset).
#[derive(Debug, Clone)]
pub struct AccountBalance {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub balance: Decimal,
    pub last_transaction_id: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

/// Immutable audit record of a single balance mutation.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub external_transaction_id: String,
    pub address: String,
    pub reference: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

/// One leg of the double-entry journal mirror.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub id: String,
    pub transaction_id: String,
    pub account_type: String,
    pub account_id: String,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
}

/// A custody wallet the reconciler polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletInfo {
    pub id: String,
    pub asset: String,
    pub network: String,
}

impl WalletInfo {
    pub fn asset_key(&self) -> String {
        asset_key(&self.asset, &self.network)
    }
}

/// Parses a canonical decimal string, mapping failure to `InvalidAmount`.
pub fn parse_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).map_err(|_| LedgerError::InvalidAmount(raw.to_string()))
}

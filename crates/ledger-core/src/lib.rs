pub mod assets;
pub mod config;
pub mod error;
pub mod time;
pub mod types;

pub use assets::{AssetCatalog, AssetConfig};
pub use error::{LedgerError, Result};
pub use types::{
    asset_key, parse_decimal, split_asset_key, AccountBalance, Address, JournalEntry, Transaction,
    TransactionType, User, WalletInfo,
};

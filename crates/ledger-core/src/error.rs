use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("duplicate transaction: external_transaction_id {external_id} already recorded as {existing_id}")]
    DuplicateTransaction {
        external_id: String,
        existing_id: String,
    },

    #[error("balance update failed: concurrent modification for user {user_id} asset {asset}")]
    ConcurrentModification { user_id: String, asset: String },

    #[error("no active user found for address {0}")]
    AddressNotFound(String),

    #[error("no active user found for {0}")]
    UserNotFound(String),

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: Decimal, requested: Decimal },

    #[error("asset mismatch: address is bound to {expected}, transaction carries {actual}")]
    AssetMismatch { expected: String, actual: String },

    #[error("custody API error: {0}")]
    Custody(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("reconciliation mismatch for user {user_id} asset {asset}: stored {stored}, computed {computed}")]
    ReconciliationMismatch {
        user_id: String,
        asset: String,
        stored: Decimal,
        computed: Decimal,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration value for {key}: {value:?}")]
    InvalidConfig { key: String, value: String },

    #[error("assets file error: {0}")]
    AssetsConfig(String),

    #[error("user id prefix {0} is already taken by another user")]
    IdempotencyPrefixCollision(String),

    #[error("invalid asset key {0:?}: expected SYMBOL-network")]
    InvalidAssetKey(String),

    #[error("no custody wallet recorded for user {user_id} asset {asset}")]
    WalletNotFound { user_id: String, asset: String },

    #[error("unparseable timestamp: {0:?}")]
    Timestamp(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

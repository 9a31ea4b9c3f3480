pub mod client;
pub mod config;
pub mod http;
pub mod types;

pub use client::CustodyApi;
pub use config::CustodyConfig;
pub use http::CustodyHttpClient;
pub use types::{
    DepositAddress, TransferTo, Wallet, WalletTransaction, WithdrawalActivity,
    STATUS_DEPOSIT_FINAL, STATUS_WITHDRAWAL_FINAL, TYPE_DEPOSIT, TYPE_WITHDRAWAL,
};

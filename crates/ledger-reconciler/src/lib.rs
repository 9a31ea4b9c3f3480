pub mod config;
mod deposit;
pub mod reconciler;
pub mod wallets;
mod withdrawal;

pub use config::ReconcilerConfig;
pub use reconciler::Reconciler;
pub use wallets::load_monitored_wallets;

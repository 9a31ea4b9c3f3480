use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::select;
use tokio::sync::{broadcast, RwLock};
use tokio::time::interval;
use tracing::{debug, error, info, trace, warn};

use ledger_core::types::WalletInfo;
use ledger_core::Result;
use ledger_custody::{CustodyApi, TYPE_DEPOSIT, TYPE_WITHDRAWAL};
use ledger_db::{Attribution, Subledger};

use crate::config::ReconcilerConfig;

/// Polls custody wallet transactions and applies them exactly once to the
/// subledger.
///
/// The processed-id cache is a throughput optimization: after a restart the
/// store's unique external-transaction-id constraint catches anything the
/// empty cache lets through.
pub struct Reconciler {
    custody: Arc<dyn CustodyApi>,
    subledger: Arc<Subledger>,
    attribution: Arc<Attribution>,
    config: ReconcilerConfig,
    portfolio_id: String,
    monitored_wallets: Vec<WalletInfo>,
    processed: RwLock<HashMap<String, DateTime<Utc>>>,
    shutdown_flag: AtomicBool,
}

impl Reconciler {
    pub fn new(
        custody: Arc<dyn CustodyApi>,
        subledger: Arc<Subledger>,
        attribution: Arc<Attribution>,
        config: ReconcilerConfig,
        portfolio_id: String,
        monitored_wallets: Vec<WalletInfo>,
    ) -> Self {
        Self {
            custody,
            subledger,
            attribution,
            config,
            portfolio_id,
            monitored_wallets,
            processed: RwLock::new(HashMap::new()),
            shutdown_flag: AtomicBool::new(false),
        }
    }

    pub(crate) fn subledger(&self) -> &Subledger {
        &self.subledger
    }

    pub(crate) fn attribution(&self) -> &Attribution {
        &self.attribution
    }

    /// Runs the poll loop in the foreground and the cleanup loop as a
    /// background task until the shutdown signal fires. Returns once both
    /// loops have stopped.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            wallets = self.monitored_wallets.len(),
            polling_interval = ?self.config.polling_interval,
            lookback_window = ?self.config.lookback_window,
            "Reconciler starting"
        );

        let flag_owner = Arc::clone(&self);
        let mut flag_listener = shutdown.resubscribe();
        tokio::spawn(async move {
            let _ = flag_listener.recv().await;
            flag_owner.shutdown_flag.store(true, Ordering::SeqCst);
        });

        let cleanup_owner = Arc::clone(&self);
        let cleanup_listener = shutdown.resubscribe();
        let cleanup_handle = tokio::spawn(async move {
            cleanup_owner.cleanup_loop(cleanup_listener).await;
        });

        let mut ticker = interval(self.config.polling_interval);
        loop {
            select! {
                _ = shutdown.recv() => {
                    info!("Reconciler received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    Arc::clone(&self).poll_once().await;
                }
            }
        }

        let _ = cleanup_handle.await;
        info!("Reconciler stopped");
        Ok(())
    }

    /// One polling cycle over all monitored wallets. Each wallet runs in its
    /// own task so a failure (or panic) of one never stalls the others.
    pub async fn poll_once(self: Arc<Self>) {
        for wallet in self.monitored_wallets.clone() {
            if self.shutdown_flag.load(Ordering::Relaxed) {
                debug!("Shutdown requested, abandoning polling cycle");
                return;
            }

            let this = Arc::clone(&self);
            let wallet_id = wallet.id.clone();
            let handle = tokio::spawn(async move { this.process_wallet(&wallet).await });
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        wallet_id = %wallet_id,
                        error = %e,
                        "Wallet poll failed, continuing with next wallet"
                    );
                }
                Err(e) => {
                    error!(
                        wallet_id = %wallet_id,
                        error = %e,
                        "Wallet poll task panicked, will retry next cycle"
                    );
                }
            }
        }
    }

    async fn process_wallet(&self, wallet: &WalletInfo) -> Result<()> {
        let since = Utc::now() - self.config.lookback_chrono();
        let transactions = self
            .custody
            .list_wallet_transactions(&self.portfolio_id, &wallet.id, since)
            .await?;

        debug!(
            wallet_id = %wallet.id,
            since = %since,
            count = transactions.len(),
            "Fetched wallet transactions"
        );

        for tx in &transactions {
            if self.is_processed(&tx.id).await {
                continue;
            }

            let outcome = match tx.transaction_type.as_str() {
                TYPE_DEPOSIT => self.handle_deposit(tx, wallet).await,
                TYPE_WITHDRAWAL => self.handle_withdrawal(tx, wallet).await,
                other => {
                    trace!(transaction_id = %tx.id, transaction_type = %other, "Ignoring transaction type");
                    Ok(())
                }
            };

            if let Err(e) = outcome {
                warn!(
                    transaction_id = %tx.id,
                    wallet_id = %wallet.id,
                    error = %e,
                    "Transaction processing failed, will retry next cycle"
                );
            }
        }

        Ok(())
    }

    pub(crate) async fn is_processed(&self, tx_id: &str) -> bool {
        self.processed.read().await.contains_key(tx_id)
    }

    pub(crate) async fn mark_processed(&self, tx_id: &str) {
        self.processed
            .write()
            .await
            .insert(tx_id.to_string(), Utc::now());
    }

    pub async fn processed_count(&self) -> usize {
        self.processed.read().await.len()
    }

    async fn cleanup_loop(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval(self.config.cleanup_interval);
        loop {
            select! {
                _ = shutdown.recv() => {
                    debug!("Cleanup loop stopping");
                    return;
                }
                _ = ticker.tick() => {
                    self.cleanup_processed().await;
                }
            }
        }
    }

    pub(crate) async fn cleanup_processed(&self) {
        let cutoff = Utc::now() - self.config.lookback_chrono();
        let mut processed = self.processed.write().await;
        let before = processed.len();
        processed.retain(|_, marked_at| *marked_at >= cutoff);
        let evicted = before - processed.len();
        if evicted > 0 {
            debug!(
                evicted = evicted,
                remaining = processed.len(),
                "Evicted old processed transaction ids"
            );
        }
    }

    #[cfg(test)]
    pub(crate) async fn mark_processed_at(&self, tx_id: &str, marked_at: DateTime<Utc>) {
        self.processed
            .write()
            .await
            .insert(tx_id.to_string(), marked_at);
    }
}

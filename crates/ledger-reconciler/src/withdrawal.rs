use tracing::{debug, info};

use ledger_core::types::{parse_decimal, TransactionType, WalletInfo};
use ledger_core::{LedgerError, Result};
use ledger_custody::{WalletTransaction, STATUS_WITHDRAWAL_FINAL};

use crate::reconciler::Reconciler;

impl Reconciler {
    /// Applies one outgoing custody transaction.
    ///
    /// The ledger dedupe key for withdrawals is the idempotency key, not the
    /// custody-assigned transaction id: the initiator's pre-debit was
    /// recorded under that key, so a completed withdrawal observed here
    /// dedupes against it instead of debiting twice.
    pub(crate) async fn handle_withdrawal(
        &self,
        tx: &WalletTransaction,
        wallet: &WalletInfo,
    ) -> Result<()> {
        if tx.status != STATUS_WITHDRAWAL_FINAL {
            debug!(
                transaction_id = %tx.id,
                status = %tx.status,
                "Skipping non-completed withdrawal, waiting for completion"
            );
            return Ok(());
        }

        let amount = parse_decimal(&tx.amount)?.abs();
        if amount.is_zero() {
            debug!(transaction_id = %tx.id, "Skipping zero-amount withdrawal");
            return Ok(());
        }

        let user_id = match self
            .attribution()
            .find_user_by_idempotency_key_prefix(&tx.idempotency_key)
            .await
        {
            Ok(user_id) => user_id,
            Err(LedgerError::UserNotFound(_)) => {
                debug!(
                    transaction_id = %tx.id,
                    idempotency_key = %tx.idempotency_key,
                    "Could not match withdrawal to a user, not marking"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let asset = wallet.asset_key();
        match self
            .subledger()
            .process_transaction(
                &user_id,
                &asset,
                TransactionType::Withdrawal,
                -amount,
                &tx.idempotency_key,
                "",
                "",
            )
            .await
        {
            Ok(applied) => {
                self.mark_processed(&tx.id).await;
                info!(
                    transaction_id = %tx.id,
                    user_id = %user_id,
                    asset = %asset,
                    amount = %amount,
                    new_balance = %applied.balance_after,
                    "Withdrawal applied"
                );
                Ok(())
            }
            Err(LedgerError::DuplicateTransaction { .. }) => {
                info!(
                    transaction_id = %tx.id,
                    idempotency_key = %tx.idempotency_key,
                    "Withdrawal already recorded, marking processed"
                );
                self.mark_processed(&tx.id).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use ledger_core::types::{parse_decimal, TransactionType, WalletInfo};
use ledger_core::{LedgerError, Result};
use ledger_custody::{WalletTransaction, STATUS_DEPOSIT_FINAL};

use crate::reconciler::Reconciler;

impl Reconciler {
    /// Applies one incoming custody transaction.
    ///
    /// Mark/skip matrix: non-final status and missing lookup key skip without
    /// marking (a later cycle retries); non-positive amounts, unknown
    /// addresses and duplicates mark processed (terminal); asset mismatches
    /// skip without marking so the misconfiguration keeps surfacing.
    pub(crate) async fn handle_deposit(
        &self,
        tx: &WalletTransaction,
        wallet: &WalletInfo,
    ) -> Result<()> {
        if tx.status != STATUS_DEPOSIT_FINAL {
            debug!(
                transaction_id = %tx.id,
                status = %tx.status,
                "Skipping non-imported deposit, waiting for completion"
            );
            return Ok(());
        }

        let amount = parse_decimal(&tx.amount)?;
        if amount <= Decimal::ZERO {
            debug!(
                transaction_id = %tx.id,
                amount = %amount,
                "Skipping non-positive deposit amount"
            );
            self.mark_processed(&tx.id).await;
            return Ok(());
        }

        let lookup = tx.deposit_lookup_key();
        if lookup.is_empty() {
            debug!(
                transaction_id = %tx.id,
                "No address or account identifier on transfer_to"
            );
            return Ok(());
        }

        let (user, address) = match self.attribution().find_user_by_address(lookup).await {
            Ok(found) => found,
            Err(LedgerError::AddressNotFound(_)) => {
                warn!(
                    transaction_id = %tx.id,
                    address = %lookup,
                    amount = %amount,
                    "Deposit to unrecognized address, marking processed"
                );
                self.mark_processed(&tx.id).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let expected_symbol = if tx.symbol.is_empty() {
            &wallet.asset
        } else {
            &tx.symbol
        };
        if address.asset != *expected_symbol {
            warn!(
                transaction_id = %tx.id,
                address = %lookup,
                address_asset = %address.asset,
                transaction_asset = %expected_symbol,
                "Asset mismatch for deposit, not marking"
            );
            return Ok(());
        }

        let asset = wallet.asset_key();
        match self
            .subledger()
            .process_transaction(
                &user.id,
                &asset,
                TransactionType::Deposit,
                amount,
                &tx.id,
                lookup,
                "",
            )
            .await
        {
            Ok(applied) => {
                self.mark_processed(&tx.id).await;
                info!(
                    transaction_id = %tx.id,
                    user_id = %user.id,
                    asset = %asset,
                    amount = %amount,
                    new_balance = %applied.balance_after,
                    "Deposit applied"
                );
                Ok(())
            }
            Err(LedgerError::DuplicateTransaction { .. }) => {
                info!(
                    transaction_id = %tx.id,
                    "Deposit already recorded, marking processed"
                );
                self.mark_processed(&tx.id).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

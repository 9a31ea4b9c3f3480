use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use ledger_core::time::{format_store_timestamp, parse_store_timestamp};
use ledger_core::types::{
    parse_decimal, AccountBalance, JournalEntry, Transaction, TransactionType,
};
use ledger_core::{LedgerError, Result};

use crate::models::{AccountBalanceRow, JournalEntryRow, TransactionRow};
use crate::pool::DatabasePool;
use crate::{queries, StoreError};

/// Hours of history the reconciler re-reads when the store holds no
/// externally-attributed transactions yet.
const WATERMARK_BOOTSTRAP_HOURS: i64 = 2;

struct JournalLeg {
    account_type: &'static str,
    account_id: String,
    debit: Decimal,
    credit: Decimal,
}

/// Atomic balance-mutation engine over the store.
///
/// Every mutation runs in one store transaction: duplicate suppression,
/// balance load-or-create, immutable transaction insert, version-checked
/// balance update, and the double-entry journal legs commit together or not
/// at all.
pub struct Subledger {
    pool: SqlitePool,
}

impl Subledger {
    pub fn new(pool: &DatabasePool) -> Self {
        Self {
            pool: pool.inner().clone(),
        }
    }

    /// The single mutation entry point.
    ///
    /// `amount` is signed: positive for deposits, negative for withdrawals.
    /// Negative resulting balances are permitted here; overdraft policy lives
    /// with the withdrawal initiator.
    pub async fn process_transaction(
        &self,
        user_id: &str,
        asset: &str,
        transaction_type: TransactionType,
        amount: Decimal,
        external_tx_id: &str,
        address: &str,
        reference: &str,
    ) -> Result<Transaction> {
        info!(
            user_id = %user_id,
            asset = %asset,
            transaction_type = %transaction_type,
            amount = %amount,
            external_tx_id = %external_tx_id,
            "Processing transaction"
        );

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        // Duplicate suppression before any locking side effects.
        if !external_tx_id.is_empty() {
            let existing: Option<(String,)> =
                sqlx::query_as(queries::CHECK_DUPLICATE_TRANSACTION)
                    .bind(external_tx_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StoreError::from)?;
            if let Some((existing_id,)) = existing {
                warn!(
                    external_tx_id = %external_tx_id,
                    existing_internal_tx_id = %existing_id,
                    "Duplicate external transaction id detected, skipping"
                );
                return Err(LedgerError::DuplicateTransaction {
                    external_id: external_tx_id.to_string(),
                    existing_id,
                });
            }
        }

        let now = Utc::now();
        let stamp = format_store_timestamp(now);

        // Load the current balance, creating a zero row on first contact.
        let existing: Option<(String, i64)> = sqlx::query_as(queries::GET_BALANCE_FOR_UPDATE)
            .bind(user_id)
            .bind(asset)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        let (current_balance, version) = match existing {
            Some((raw, version)) => (parse_decimal(&raw)?, version),
            None => {
                sqlx::query(queries::INSERT_ACCOUNT_BALANCE)
                    .bind(Uuid::new_v4().to_string())
                    .bind(user_id)
                    .bind(asset)
                    .bind(&stamp)
                    .execute(&mut *tx)
                    .await
                    .map_err(StoreError::from)?;
                (Decimal::ZERO, 1)
            }
        };

        let new_balance = current_balance + amount;
        let transaction_id = Uuid::new_v4().to_string();

        sqlx::query(queries::INSERT_TRANSACTION)
            .bind(&transaction_id)
            .bind(user_id)
            .bind(asset)
            .bind(transaction_type.as_str())
            .bind(amount.to_string())
            .bind(current_balance.to_string())
            .bind(new_balance.to_string())
            .bind(external_tx_id)
            .bind(address)
            .bind(reference)
            .bind("confirmed")
            .bind(&stamp)
            .bind(&stamp)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;

        // Optimistic-concurrency control point: a concurrent writer that
        // advanced the version first makes this affect zero rows.
        let updated = sqlx::query(queries::UPDATE_ACCOUNT_BALANCE)
            .bind(new_balance.to_string())
            .bind(&transaction_id)
            .bind(&stamp)
            .bind(user_id)
            .bind(asset)
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::from)?;
        if updated.rows_affected() == 0 {
            return Err(LedgerError::ConcurrentModification {
                user_id: user_id.to_string(),
                asset: asset.to_string(),
            });
        }

        let transaction = Transaction {
            id: transaction_id,
            user_id: user_id.to_string(),
            asset: asset.to_string(),
            transaction_type,
            amount,
            balance_before: current_balance,
            balance_after: new_balance,
            external_transaction_id: external_tx_id.to_string(),
            address: address.to_string(),
            reference: reference.to_string(),
            status: "confirmed".to_string(),
            created_at: now,
            processed_at: now,
        };

        for leg in journal_legs(&transaction) {
            sqlx::query(queries::INSERT_JOURNAL_ENTRY)
                .bind(Uuid::new_v4().to_string())
                .bind(&transaction.id)
                .bind(leg.account_type)
                .bind(&leg.account_id)
                .bind(leg.debit.to_string())
                .bind(leg.credit.to_string())
                .bind(&stamp)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;

        info!(
            transaction_id = %transaction.id,
            user_id = %user_id,
            asset = %asset,
            old_balance = %current_balance,
            new_balance = %new_balance,
            "Transaction processed"
        );
        Ok(transaction)
    }

    /// Records the compensating credit for a withdrawal whose external
    /// submission failed after the local pre-debit.
    ///
    /// The external id is derived deterministically from the original key so
    /// reversals are themselves idempotent; the original key is kept in
    /// `reference` for the audit trail.
    pub async fn reverse_withdrawal(
        &self,
        user_id: &str,
        asset: &str,
        amount: Decimal,
        original_external_id: &str,
    ) -> Result<Transaction> {
        let reversal_id = format!("rev:{}", original_external_id);
        info!(
            user_id = %user_id,
            asset = %asset,
            amount = %amount,
            original_external_id = %original_external_id,
            "Reversing withdrawal"
        );
        self.process_transaction(
            user_id,
            asset,
            TransactionType::Deposit,
            amount,
            &reversal_id,
            "",
            original_external_id,
        )
        .await
    }

    /// Current balance; a missing row reads as zero.
    pub async fn get_balance(&self, user_id: &str, asset: &str) -> Result<Decimal> {
        let row: Option<(String,)> = sqlx::query_as(queries::GET_BALANCE)
            .bind(user_id)
            .bind(asset)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some((raw,)) => parse_decimal(&raw),
            None => Ok(Decimal::ZERO),
        }
    }

    /// All non-zero balances for a user, ordered by asset.
    pub async fn get_all_balances(&self, user_id: &str) -> Result<Vec<AccountBalance>> {
        let rows: Vec<AccountBalanceRow> = sqlx::query_as(queries::GET_USER_BALANCES)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        let balances: Result<Vec<AccountBalance>> =
            rows.into_iter().map(AccountBalance::try_from).collect();
        Ok(balances?
            .into_iter()
            .filter(|b| !b.balance.is_zero())
            .collect())
    }

    /// Paginated history, newest first. Limit is clamped to [1, 100].
    pub async fn get_transaction_history(
        &self,
        user_id: &str,
        asset: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);
        debug!(
            user_id = %user_id,
            asset = %asset,
            limit = limit,
            offset = offset,
            "Getting transaction history"
        );

        let rows: Vec<TransactionRow> = sqlx::query_as(queries::GET_TRANSACTION_HISTORY)
            .bind(user_id)
            .bind(asset)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    /// Journal legs for one transaction, in insertion order.
    pub async fn journal_entries(&self, transaction_id: &str) -> Result<Vec<JournalEntry>> {
        let rows: Vec<JournalEntryRow> = sqlx::query_as(queries::GET_JOURNAL_ENTRIES)
            .bind(transaction_id)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.into_iter().map(JournalEntry::try_from).collect()
    }

    /// Verifies that the stored balance equals the signed sum of confirmed
    /// transactions. Arithmetic is exact-decimal, so the tolerance is zero.
    /// This audits; it never repairs.
    pub async fn reconcile(&self, user_id: &str, asset: &str) -> Result<()> {
        let stored = self.get_balance(user_id, asset).await?;

        let amounts: Vec<(String,)> = sqlx::query_as(queries::GET_CONFIRMED_AMOUNTS)
            .bind(user_id)
            .bind(asset)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        let mut computed = Decimal::ZERO;
        for (raw,) in &amounts {
            computed += parse_decimal(raw)?;
        }

        if stored != computed {
            warn!(
                user_id = %user_id,
                asset = %asset,
                stored = %stored,
                computed = %computed,
                "Balance reconciliation failed"
            );
            return Err(LedgerError::ReconciliationMismatch {
                user_id: user_id.to_string(),
                asset: asset.to_string(),
                stored,
                computed,
            });
        }

        info!(user_id = %user_id, asset = %asset, balance = %stored, "Balance reconciled");
        Ok(())
    }

    /// Watermark seed for the reconciler: the most recent `created_at` among
    /// externally-attributed transactions, or two hours ago when the store is
    /// fresh.
    pub async fn most_recent_transaction_time(&self) -> Result<chrono::DateTime<Utc>> {
        let (raw,): (Option<String>,) =
            sqlx::query_as(queries::GET_MOST_RECENT_EXTERNAL_TX_TIME)
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from)?;
        match raw {
            Some(value) if !value.is_empty() => parse_store_timestamp(&value),
            _ => Ok(Utc::now() - ChronoDuration::hours(WATERMARK_BOOTSTRAP_HOURS)),
        }
    }
}

// Deposits debit the user asset account and credit the system liability
// account; withdrawals mirror it. Debits equal credits within each
// transaction.
fn journal_legs(transaction: &Transaction) -> [JournalLeg; 2] {
    let user_account = format!("{}_{}", transaction.user_id, transaction.asset);
    let liability_account = format!("user_deposits_{}", transaction.asset);

    match transaction.transaction_type {
        TransactionType::Deposit => [
            JournalLeg {
                account_type: "user_asset",
                account_id: user_account,
                debit: transaction.amount,
                credit: Decimal::ZERO,
            },
            JournalLeg {
                account_type: "system_liability",
                account_id: liability_account,
                debit: Decimal::ZERO,
                credit: transaction.amount,
            },
        ],
        TransactionType::Withdrawal => [
            JournalLeg {
                account_type: "user_asset",
                account_id: user_account,
                debit: Decimal::ZERO,
                credit: -transaction.amount,
            },
            JournalLeg {
                account_type: "system_liability",
                account_id: liability_account,
                debit: -transaction.amount,
                credit: Decimal::ZERO,
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn setup() -> (DatabasePool, Subledger) {
        let pool = DatabasePool::connect_in_memory().await.unwrap();
        pool.init_schema().await.unwrap();
        let subledger = Subledger::new(&pool);
        (pool, subledger)
    }

    #[tokio::test]
    async fn deposit_creates_balance_and_audit_row() {
        let (_pool, subledger) = setup().await;

        let tx = subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Deposit,
                dec!(1.5),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();

        assert_eq!(tx.user_id, "user1");
        assert_eq!(tx.balance_before, Decimal::ZERO);
        assert_eq!(tx.balance_after, dec!(1.5));
        assert_eq!(tx.status, "confirmed");
        assert_eq!(
            subledger
                .get_balance("user1", "BTC-bitcoin-mainnet")
                .await
                .unwrap(),
            dec!(1.5)
        );
    }

    #[tokio::test]
    async fn withdrawal_reduces_balance() {
        let (_pool, subledger) = setup().await;
        subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Deposit,
                dec!(2.0),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();

        let tx = subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Withdrawal,
                dec!(-0.5),
                "tx2",
                "",
                "",
            )
            .await
            .unwrap();

        assert_eq!(tx.balance_after, dec!(1.5));
    }

    #[tokio::test]
    async fn duplicate_external_id_is_suppressed() {
        let (_pool, subledger) = setup().await;
        let first = subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Deposit,
                dec!(1.0),
                "duplicate-tx",
                "addr1",
                "",
            )
            .await
            .unwrap();

        let err = subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Deposit,
                dec!(1.0),
                "duplicate-tx",
                "addr1",
                "",
            )
            .await
            .unwrap_err();

        match err {
            LedgerError::DuplicateTransaction { existing_id, .. } => {
                assert_eq!(existing_id, first.id);
            }
            other => panic!("expected DuplicateTransaction, got {other:?}"),
        }

        // Exactly one row and one balance delta survived.
        let history = subledger
            .get_transaction_history("user1", "BTC-bitcoin-mainnet", 10, 0)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(
            subledger
                .get_balance("user1", "BTC-bitcoin-mainnet")
                .await
                .unwrap(),
            dec!(1.0)
        );
    }

    #[tokio::test]
    async fn negative_balance_is_permitted() {
        let (_pool, subledger) = setup().await;
        let tx = subledger
            .process_transaction(
                "user1",
                "BTC-bitcoin-mainnet",
                TransactionType::Withdrawal,
                dec!(-1.0),
                "tx1",
                "",
                "",
            )
            .await
            .unwrap();
        assert_eq!(tx.balance_after, dec!(-1.0));
    }

    #[tokio::test]
    async fn version_advances_by_one_per_mutation() {
        let (_pool, subledger) = setup().await;
        for (i, amount) in [dec!(1), dec!(2), dec!(3)].iter().enumerate() {
            subledger
                .process_transaction(
                    "user1",
                    "ETH-ethereum-mainnet",
                    TransactionType::Deposit,
                    *amount,
                    &format!("tx{i}"),
                    "addr1",
                    "",
                )
                .await
                .unwrap();
        }

        let balances = subledger.get_all_balances("user1").await.unwrap();
        assert_eq!(balances.len(), 1);
        // Fresh row starts at 1; each of the three mutations bumps it once.
        assert_eq!(balances[0].version, 4);
        assert_eq!(balances[0].balance, dec!(6));
    }

    #[tokio::test]
    async fn journal_legs_balance_per_transaction() {
        let (_pool, subledger) = setup().await;
        let deposit = subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Deposit,
                dec!(1.5),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();
        let withdrawal = subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Withdrawal,
                dec!(-0.4),
                "tx2",
                "",
                "",
            )
            .await
            .unwrap();

        for tx in [&deposit, &withdrawal] {
            let legs = subledger.journal_entries(&tx.id).await.unwrap();
            assert_eq!(legs.len(), 2);
            let debits: Decimal = legs.iter().map(|l| l.debit_amount).sum();
            let credits: Decimal = legs.iter().map(|l| l.credit_amount).sum();
            assert_eq!(debits, credits);
        }

        let deposit_legs = subledger.journal_entries(&deposit.id).await.unwrap();
        assert_eq!(deposit_legs[0].account_type, "user_asset");
        assert_eq!(deposit_legs[0].account_id, "user1_ETH-ethereum-mainnet");
        assert_eq!(deposit_legs[0].debit_amount, dec!(1.5));
        assert_eq!(deposit_legs[1].account_type, "system_liability");
        assert_eq!(
            deposit_legs[1].account_id,
            "user_deposits_ETH-ethereum-mainnet"
        );
        assert_eq!(deposit_legs[1].credit_amount, dec!(1.5));
    }

    #[tokio::test]
    async fn reversal_restores_balance_and_is_idempotent() {
        let (_pool, subledger) = setup().await;
        subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Deposit,
                dec!(1.5),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();
        subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Withdrawal,
                dec!(-0.5),
                "abcd1234-key",
                "",
                "",
            )
            .await
            .unwrap();

        let reversal = subledger
            .reverse_withdrawal("user1", "ETH-ethereum-mainnet", dec!(0.5), "abcd1234-key")
            .await
            .unwrap();
        assert_eq!(reversal.external_transaction_id, "rev:abcd1234-key");
        assert_eq!(reversal.reference, "abcd1234-key");
        assert_eq!(
            subledger
                .get_balance("user1", "ETH-ethereum-mainnet")
                .await
                .unwrap(),
            dec!(1.5)
        );

        // Replaying the reversal dedupes on the derived external id.
        let err = subledger
            .reverse_withdrawal("user1", "ETH-ethereum-mainnet", dec!(0.5), "abcd1234-key")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTransaction { .. }));
    }

    #[tokio::test]
    async fn history_is_newest_first_with_clamped_limit() {
        let (_pool, subledger) = setup().await;
        for i in 0..3 {
            subledger
                .process_transaction(
                    "user1",
                    "ETH-ethereum-mainnet",
                    TransactionType::Deposit,
                    Decimal::from(i + 1),
                    &format!("tx{i}"),
                    "addr1",
                    "",
                )
                .await
                .unwrap();
        }

        let all = subledger
            .get_transaction_history("user1", "ETH-ethereum-mainnet", 1000, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].created_at >= all[1].created_at);
        assert!(all[1].created_at >= all[2].created_at);

        // A non-positive limit clamps to one row, not zero.
        let clamped = subledger
            .get_transaction_history("user1", "ETH-ethereum-mainnet", 0, 0)
            .await
            .unwrap();
        assert_eq!(clamped.len(), 1);
    }

    #[tokio::test]
    async fn reconcile_detects_tampered_balance() {
        let (pool, subledger) = setup().await;
        subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Deposit,
                dec!(1.5),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();

        subledger
            .reconcile("user1", "ETH-ethereum-mainnet")
            .await
            .unwrap();

        sqlx::query("UPDATE account_balances SET balance = '99' WHERE user_id = 'user1'")
            .execute(pool.inner())
            .await
            .unwrap();

        let err = subledger
            .reconcile("user1", "ETH-ethereum-mainnet")
            .await
            .unwrap_err();
        match err {
            LedgerError::ReconciliationMismatch {
                stored, computed, ..
            } => {
                assert_eq!(stored, dec!(99));
                assert_eq!(computed, dec!(1.5));
            }
            other => panic!("expected ReconciliationMismatch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn watermark_bootstraps_to_two_hours_ago() {
        let (_pool, subledger) = setup().await;
        let before = Utc::now() - ChronoDuration::hours(2) - ChronoDuration::seconds(5);
        let watermark = subledger.most_recent_transaction_time().await.unwrap();
        let after = Utc::now() - ChronoDuration::hours(2) + ChronoDuration::seconds(5);
        assert!(watermark > before && watermark < after);
    }

    #[tokio::test]
    async fn watermark_tracks_latest_external_transaction() {
        let (_pool, subledger) = setup().await;
        let tx = subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Deposit,
                dec!(1),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();

        // Storage truncates to microseconds; compare at that precision.
        let watermark = subledger.most_recent_transaction_time().await.unwrap();
        assert_eq!(watermark.timestamp_micros(), tx.created_at.timestamp_micros());
    }

    #[tokio::test]
    async fn stale_version_update_affects_zero_rows() {
        let (pool, subledger) = setup().await;
        subledger
            .process_transaction(
                "user1",
                "ETH-ethereum-mainnet",
                TransactionType::Deposit,
                dec!(1),
                "tx1",
                "addr1",
                "",
            )
            .await
            .unwrap();

        // A writer holding a version another mutation already advanced past
        // must lose: this is how ConcurrentModification is raised.
        let stale = sqlx::query(queries::UPDATE_ACCOUNT_BALANCE)
            .bind("5")
            .bind("tx-x")
            .bind(format_store_timestamp(Utc::now()))
            .bind("user1")
            .bind("ETH-ethereum-mainnet")
            .bind(1i64)
            .execute(pool.inner())
            .await
            .unwrap();
        assert_eq!(stale.rows_affected(), 0);
    }

    #[test]
    fn withdrawal_journal_legs_use_absolute_amounts() {
        let tx = Transaction {
            id: "t1".into(),
            user_id: "u1".into(),
            asset: "BTC-bitcoin-mainnet".into(),
            transaction_type: TransactionType::Withdrawal,
            amount: dec!(-0.75),
            balance_before: dec!(1),
            balance_after: dec!(0.25),
            external_transaction_id: "x".into(),
            address: String::new(),
            reference: String::new(),
            status: "confirmed".into(),
            created_at: Utc::now(),
            processed_at: Utc::now(),
        };
        let legs = journal_legs(&tx);
        assert_eq!(legs[0].credit, dec!(0.75));
        assert_eq!(legs[0].debit, Decimal::ZERO);
        assert_eq!(legs[1].debit, dec!(0.75));
        assert_eq!(legs[1].credit, Decimal::ZERO);
    }
}

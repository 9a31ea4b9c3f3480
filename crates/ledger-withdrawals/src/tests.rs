use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;

use ledger_core::types::TransactionType;
use ledger_core::{LedgerError, Result};
use ledger_custody::types::{DepositAddress, Wallet, WalletTransaction, WithdrawalActivity};
use ledger_custody::CustodyApi;
use ledger_db::repositories::{AddressRepository, UserRepository};
use ledger_db::{DatabasePool, Subledger};

use crate::initiator::{mint_idempotency_key, WithdrawalInitiator, WithdrawalRequest};

const USER_ID: &str = "abcd1234-0000-4000-8000-000000000001";
const ASSET_KEY: &str = "ETH-ethereum-mainnet";

#[derive(Default)]
struct MockCustody {
    fail_withdrawals: AtomicBool,
    submitted_keys: Mutex<Vec<String>>,
}

#[async_trait]
impl CustodyApi for MockCustody {
    async fn list_wallets(&self, _: &str, _: &str, _: &[String]) -> Result<Vec<Wallet>> {
        Err(LedgerError::Custody("not scripted".into()))
    }

    async fn create_wallet(&self, _: &str, _: &str, _: &str, _: &str) -> Result<Wallet> {
        Err(LedgerError::Custody("not scripted".into()))
    }

    async fn create_deposit_address(
        &self,
        _: &str,
        _: &str,
        _: &str,
        _: &str,
    ) -> Result<DepositAddress> {
        Err(LedgerError::Custody("not scripted".into()))
    }

    async fn list_wallet_transactions(
        &self,
        _: &str,
        _: &str,
        _: DateTime<Utc>,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(Vec::new())
    }

    async fn create_withdrawal(
        &self,
        _: &str,
        _: &str,
        destination: &str,
        amount: &str,
        asset: &str,
        idempotency_key: &str,
    ) -> Result<WithdrawalActivity> {
        if self.fail_withdrawals.load(Ordering::SeqCst) {
            return Err(LedgerError::Custody("withdrawal rejected".into()));
        }
        self.submitted_keys
            .lock()
            .unwrap()
            .push(idempotency_key.to_string());
        Ok(WithdrawalActivity {
            activity_id: "activity-1".to_string(),
            amount: amount.to_string(),
            asset: asset.to_string(),
            destination: destination.to_string(),
        })
    }
}

struct Harness {
    custody: Arc<MockCustody>,
    subledger: Arc<Subledger>,
    initiator: WithdrawalInitiator,
}

async fn setup(initial_balance: rust_decimal::Decimal) -> Harness {
    let pool = DatabasePool::connect_in_memory().await.unwrap();
    pool.init_schema().await.unwrap();
    UserRepository::insert_with_id(pool.inner(), USER_ID, "Alice Johnson", "alice@example.com")
        .await
        .unwrap();
    AddressRepository::insert(
        pool.inner(),
        USER_ID,
        "ETH",
        "ethereum-mainnet",
        "0xABC",
        "wallet-1",
        "",
    )
    .await
    .unwrap();

    let subledger = Arc::new(Subledger::new(&pool));
    if !initial_balance.is_zero() {
        subledger
            .process_transaction(
                USER_ID,
                ASSET_KEY,
                TransactionType::Deposit,
                initial_balance,
                "seed-tx",
                "0xABC",
                "",
            )
            .await
            .unwrap();
    }

    let custody = Arc::new(MockCustody::default());
    let initiator = WithdrawalInitiator::new(
        custody.clone() as Arc<dyn CustodyApi>,
        subledger.clone(),
        pool,
        "portfolio-1".to_string(),
    );

    Harness {
        custody,
        subledger,
        initiator,
    }
}

fn request(amount: rust_decimal::Decimal) -> WithdrawalRequest {
    WithdrawalRequest {
        email: "alice@example.com".to_string(),
        asset: ASSET_KEY.to_string(),
        amount,
        destination: "0xFEED".to_string(),
    }
}

#[tokio::test]
async fn successful_withdrawal_reserves_funds() {
    let h = setup(dec!(1.5)).await;

    let receipt = h.initiator.initiate(&request(dec!(0.5))).await.unwrap();

    assert_eq!(receipt.activity_id, "activity-1");
    assert_eq!(receipt.balance_before, dec!(1.5));
    assert_eq!(receipt.balance_reserved, dec!(1.0));
    // The key carries the owner: first segments match.
    assert_eq!(receipt.idempotency_key.split('-').next(), Some("abcd1234"));
    assert_eq!(
        h.custody.submitted_keys.lock().unwrap().as_slice(),
        &[receipt.idempotency_key.clone()]
    );
    assert_eq!(
        h.subledger.get_balance(USER_ID, ASSET_KEY).await.unwrap(),
        dec!(1.0)
    );
}

#[tokio::test]
async fn failed_custody_call_is_compensated() {
    let h = setup(dec!(1.5)).await;
    h.custody.fail_withdrawals.store(true, Ordering::SeqCst);

    let err = h.initiator.initiate(&request(dec!(0.5))).await.unwrap_err();
    assert!(matches!(err, LedgerError::Custody(_)));

    // Pre-debit plus compensating credit: balance is back where it started.
    assert_eq!(
        h.subledger.get_balance(USER_ID, ASSET_KEY).await.unwrap(),
        dec!(1.5)
    );
    let history = h
        .subledger
        .get_transaction_history(USER_ID, ASSET_KEY, 10, 0)
        .await
        .unwrap();
    // seed deposit + pre-debit + reversal
    assert_eq!(history.len(), 3);
    let reversal = history
        .iter()
        .find(|tx| tx.external_transaction_id.starts_with("rev:"))
        .expect("reversal row missing");
    assert_eq!(reversal.amount, dec!(0.5));
    let predebit = history
        .iter()
        .find(|tx| tx.external_transaction_id == reversal.reference)
        .expect("pre-debit row missing");
    assert_eq!(predebit.amount, dec!(-0.5));
}

#[tokio::test]
async fn insufficient_funds_has_no_side_effects() {
    let h = setup(dec!(0.3)).await;

    let err = h.initiator.initiate(&request(dec!(0.5))).await.unwrap_err();
    match err {
        LedgerError::InsufficientFunds { balance, requested } => {
            assert_eq!(balance, dec!(0.3));
            assert_eq!(requested, dec!(0.5));
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    let history = h
        .subledger
        .get_transaction_history(USER_ID, ASSET_KEY, 10, 0)
        .await
        .unwrap();
    assert_eq!(history.len(), 1); // only the seed deposit
    assert!(h.custody.submitted_keys.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_withdrawal_fails_once_funds_are_reserved() {
    let h = setup(dec!(1.5)).await;

    h.initiator.initiate(&request(dec!(1.0))).await.unwrap();
    let err = h.initiator.initiate(&request(dec!(0.8))).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    assert_eq!(
        h.subledger.get_balance(USER_ID, ASSET_KEY).await.unwrap(),
        dec!(0.5)
    );
}

#[tokio::test]
async fn unknown_email_is_rejected() {
    let h = setup(dec!(1.0)).await;
    let mut req = request(dec!(0.5));
    req.email = "nobody@example.com".to_string();

    let err = h.initiator.initiate(&req).await.unwrap_err();
    assert!(matches!(err, LedgerError::UserNotFound(_)));
}

#[tokio::test]
async fn missing_wallet_is_rejected() {
    let h = setup(dec!(1.0)).await;
    let mut req = request(dec!(0.5));
    req.asset = "BTC-bitcoin-mainnet".to_string();
    // Fund the BTC balance so the balance gate passes first.
    h.subledger
        .process_transaction(
            USER_ID,
            "BTC-bitcoin-mainnet",
            TransactionType::Deposit,
            dec!(1.0),
            "seed-btc",
            "addr",
            "",
        )
        .await
        .unwrap();

    let err = h.initiator.initiate(&req).await.unwrap_err();
    assert!(matches!(err, LedgerError::WalletNotFound { .. }));
}

#[tokio::test]
async fn bare_symbol_asset_key_is_rejected() {
    let h = setup(dec!(1.0)).await;
    let mut req = request(dec!(0.5));
    req.asset = "ETH".to_string();

    let err = h.initiator.initiate(&req).await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAssetKey(_)));
}

#[test]
fn minted_key_is_uuid_shaped_and_carries_the_owner_prefix() {
    let key = mint_idempotency_key(USER_ID);
    let segments: Vec<&str> = key.split('-').collect();
    assert_eq!(segments.len(), 5);
    assert_eq!(segments[0], "abcd1234");
    assert_eq!(key.len(), 36);

    // Fresh tails each time.
    assert_ne!(mint_idempotency_key(USER_ID), key);
}

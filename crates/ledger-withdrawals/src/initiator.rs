use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use ledger_core::types::{split_asset_key, TransactionType};
use ledger_core::{LedgerError, Result};
use ledger_custody::CustodyApi;
use ledger_db::repositories::{AddressRepository, UserRepository};
use ledger_db::{DatabasePool, Subledger};

/// A withdrawal request as received from the operator surface.
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub email: String,
    /// Ledger asset key, `SYMBOL-network`.
    pub asset: String,
    pub amount: Decimal,
    pub destination: String,
}

/// Outcome of a successful initiation.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    pub activity_id: String,
    pub user_id: String,
    pub asset: String,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_reserved: Decimal,
    pub idempotency_key: String,
}

/// Synchronous withdrawal pipeline: balance gate, idempotency-key mint,
/// local pre-debit, external submit, compensating credit on failure.
///
/// The pre-debit reserves the funds before the custody call, so two
/// concurrent requests against the same balance cannot both pass the gate
/// and both settle.
pub struct WithdrawalInitiator {
    custody: Arc<dyn CustodyApi>,
    subledger: Arc<Subledger>,
    pool: DatabasePool,
    portfolio_id: String,
}

impl WithdrawalInitiator {
    pub fn new(
        custody: Arc<dyn CustodyApi>,
        subledger: Arc<Subledger>,
        pool: DatabasePool,
        portfolio_id: String,
    ) -> Self {
        Self {
            custody,
            subledger,
            pool,
            portfolio_id,
        }
    }

    pub async fn initiate(&self, request: &WithdrawalRequest) -> Result<WithdrawalReceipt> {
        if request.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(request.amount.to_string()));
        }
        let (symbol, network) = split_asset_key(&request.asset)?;

        let user = UserRepository::get_by_email(self.pool.inner(), &request.email).await?;
        info!(
            user_id = %user.id,
            email = %request.email,
            asset = %request.asset,
            amount = %request.amount,
            "Starting withdrawal"
        );

        // The only layer that enforces overdraft policy.
        let balance = self.subledger.get_balance(&user.id, &request.asset).await?;
        if balance < request.amount {
            return Err(LedgerError::InsufficientFunds {
                balance,
                requested: request.amount,
            });
        }

        let addresses = AddressRepository::list_for_user_asset(
            self.pool.inner(),
            &user.id,
            symbol,
            network,
        )
        .await?;
        let wallet_id = match addresses.first() {
            Some(address) if !address.wallet_id.is_empty() => address.wallet_id.clone(),
            _ => {
                return Err(LedgerError::WalletNotFound {
                    user_id: user.id.clone(),
                    asset: request.asset.clone(),
                })
            }
        };

        let idempotency_key = mint_idempotency_key(&user.id);
        info!(
            user_id = %user.id,
            wallet_id = %wallet_id,
            idempotency_key = %idempotency_key,
            "Generated idempotency key"
        );

        // Reserve the funds before the external call. The reconciler later
        // observes the completed withdrawal under this same key and dedupes.
        let predebit = self
            .subledger
            .process_transaction(
                &user.id,
                &request.asset,
                TransactionType::Withdrawal,
                -request.amount,
                &idempotency_key,
                "",
                "",
            )
            .await?;

        let activity = match self
            .custody
            .create_withdrawal(
                &self.portfolio_id,
                &wallet_id,
                &request.destination,
                &request.amount.to_string(),
                &request.asset,
                &idempotency_key,
            )
            .await
        {
            Ok(activity) => activity,
            Err(submit_err) => {
                warn!(
                    user_id = %user.id,
                    idempotency_key = %idempotency_key,
                    error = %submit_err,
                    "Custody withdrawal failed, reversing pre-debit"
                );
                match self
                    .subledger
                    .reverse_withdrawal(&user.id, &request.asset, request.amount, &idempotency_key)
                    .await
                {
                    Ok(_) => return Err(submit_err),
                    Err(reversal_err) => {
                        error!(
                            user_id = %user.id,
                            asset = %request.asset,
                            amount = %request.amount,
                            idempotency_key = %idempotency_key,
                            error = %reversal_err,
                            "Compensating credit failed, balance requires manual intervention"
                        );
                        return Err(reversal_err);
                    }
                }
            }
        };

        info!(
            activity_id = %activity.activity_id,
            user_id = %user.id,
            asset = %request.asset,
            amount = %request.amount,
            remaining_balance = %predebit.balance_after,
            "Withdrawal created"
        );

        Ok(WithdrawalReceipt {
            activity_id: activity.activity_id,
            user_id: user.id,
            asset: request.asset.clone(),
            amount: request.amount,
            balance_before: predebit.balance_before,
            balance_reserved: predebit.balance_after,
            idempotency_key,
        })
    }
}

/// Mints the attribution-carrying idempotency key: the owner's id first
/// segment followed by the tail of a fresh UUID. The result is UUID-shaped,
/// so the custody API accepts it, and the reconciler can recover the owner
/// from the first segment alone.
pub fn mint_idempotency_key(user_id: &str) -> String {
    let prefix = user_id.split('-').next().unwrap_or(user_id);
    let fresh = Uuid::new_v4().to_string();
    let tail: Vec<&str> = fresh.split('-').skip(1).collect();
    format!("{}-{}", prefix, tail.join("-"))
}

//! Row types mirroring the store schema. Decimal and timestamp columns come
//! back as TEXT and are parsed at the boundary into the domain types.

use ledger_core::time::parse_store_timestamp;
use ledger_core::types::{
    parse_decimal, AccountBalance, Address, JournalEntry, Transaction, TransactionType, User,
};
use ledger_core::{LedgerError, Result};
use sqlx::FromRow;
use std::str::FromStr;

#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = LedgerError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            active: row.active,
            created_at: parse_store_timestamp(&row.created_at)?,
            updated_at: parse_store_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AddressRow {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub network: String,
    pub address: String,
    pub wallet_id: String,
    pub account_identifier: String,
    pub created_at: String,
}

impl TryFrom<AddressRow> for Address {
    type Error = LedgerError;

    fn try_from(row: AddressRow) -> Result<Self> {
        Ok(Address {
            id: row.id,
            user_id: row.user_id,
            asset: row.asset,
            network: row.network,
            address: row.address,
            wallet_id: row.wallet_id,
            account_identifier: row.account_identifier,
            created_at: parse_store_timestamp(&row.created_at)?,
        })
    }
}

/// Joined row for deposit attribution: the owning user plus the matching
/// address, with aliased column names.
#[derive(Debug, Clone, FromRow)]
pub struct UserAddressRow {
    pub user_id: String,
    pub user_name: String,
    pub user_email: String,
    pub user_active: bool,
    pub user_created_at: String,
    pub user_updated_at: String,
    pub address_id: String,
    pub asset: String,
    pub network: String,
    pub address: String,
    pub wallet_id: String,
    pub account_identifier: String,
    pub address_created_at: String,
}

impl TryFrom<UserAddressRow> for (User, Address) {
    type Error = LedgerError;

    fn try_from(row: UserAddressRow) -> Result<Self> {
        let user = User {
            id: row.user_id.clone(),
            name: row.user_name,
            email: row.user_email,
            active: row.user_active,
            created_at: parse_store_timestamp(&row.user_created_at)?,
            updated_at: parse_store_timestamp(&row.user_updated_at)?,
        };
        let address = Address {
            id: row.address_id,
            user_id: row.user_id,
            asset: row.asset,
            network: row.network,
            address: row.address,
            wallet_id: row.wallet_id,
            account_identifier: row.account_identifier,
            created_at: parse_store_timestamp(&row.address_created_at)?,
        };
        Ok((user, address))
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AccountBalanceRow {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub balance: String,
    pub last_transaction_id: Option<String>,
    pub version: i64,
    pub updated_at: String,
}

impl TryFrom<AccountBalanceRow> for AccountBalance {
    type Error = LedgerError;

    fn try_from(row: AccountBalanceRow) -> Result<Self> {
        Ok(AccountBalance {
            id: row.id,
            user_id: row.user_id,
            asset: row.asset,
            balance: parse_decimal(&row.balance)?,
            last_transaction_id: row.last_transaction_id,
            version: row.version,
            updated_at: parse_store_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: String,
    pub user_id: String,
    pub asset: String,
    pub transaction_type: String,
    pub amount: String,
    pub balance_before: String,
    pub balance_after: String,
    pub external_transaction_id: String,
    pub address: String,
    pub reference: String,
    pub status: String,
    pub created_at: String,
    pub processed_at: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        Ok(Transaction {
            id: row.id,
            user_id: row.user_id,
            asset: row.asset,
            transaction_type: TransactionType::from_str(&row.transaction_type)?,
            amount: parse_decimal(&row.amount)?,
            balance_before: parse_decimal(&row.balance_before)?,
            balance_after: parse_decimal(&row.balance_after)?,
            external_transaction_id: row.external_transaction_id,
            address: row.address,
            reference: row.reference,
            status: row.status,
            created_at: parse_store_timestamp(&row.created_at)?,
            processed_at: parse_store_timestamp(&row.processed_at)?,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct JournalEntryRow {
    pub id: String,
    pub transaction_id: String,
    pub account_type: String,
    pub account_id: String,
    pub debit_amount: String,
    pub credit_amount: String,
}

impl TryFrom<JournalEntryRow> for JournalEntry {
    type Error = LedgerError;

    fn try_from(row: JournalEntryRow) -> Result<Self> {
        Ok(JournalEntry {
            id: row.id,
            transaction_id: row.transaction_id,
            account_type: row.account_type,
            account_id: row.account_id,
            debit_amount: parse_decimal(&row.debit_amount)?,
            credit_amount: parse_decimal(&row.credit_amount)?,
        })
    }
}

//! Single catalog of every SQL statement the store runs. Schema
//! initialization and runtime lookups share these constants so the two can
//! never drift apart.

/// Idempotent schema for the embedded store.
///
/// Amount columns are canonical decimal TEXT; timestamp columns are TEXT in
/// RFC3339-with-microseconds for rows written by this process. The partial
/// unique index on `external_transaction_id` is the store-level duplicate
/// suppression key.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    active BOOLEAN NOT NULL DEFAULT 1,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
CREATE INDEX IF NOT EXISTS idx_users_active ON users(active);

CREATE TABLE IF NOT EXISTS addresses (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    asset TEXT NOT NULL,
    network TEXT NOT NULL,
    address TEXT NOT NULL,
    wallet_id TEXT NOT NULL,
    account_identifier TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_addresses_user_asset ON addresses(user_id, asset, network);
CREATE INDEX IF NOT EXISTS idx_addresses_address ON addresses(address);
CREATE INDEX IF NOT EXISTS idx_addresses_wallet_id ON addresses(wallet_id);
CREATE INDEX IF NOT EXISTS idx_addresses_created_at ON addresses(created_at);

CREATE TABLE IF NOT EXISTS account_balances (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    asset TEXT NOT NULL,
    balance TEXT NOT NULL DEFAULT '0',
    last_transaction_id TEXT,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(user_id, asset)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_account_balances_user_asset ON account_balances(user_id, asset);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    asset TEXT NOT NULL,
    transaction_type TEXT NOT NULL,
    amount TEXT NOT NULL,
    balance_before TEXT NOT NULL,
    balance_after TEXT NOT NULL,
    external_transaction_id TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    reference TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL DEFAULT 'confirmed',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    processed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_transactions_user_asset ON transactions(user_id, asset, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_transactions_created_at ON transactions(created_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_external_id
    ON transactions(external_transaction_id) WHERE external_transaction_id != '';
CREATE INDEX IF NOT EXISTS idx_transactions_status ON transactions(status);

CREATE TABLE IF NOT EXISTS journal_entries (
    id TEXT PRIMARY KEY,
    transaction_id TEXT NOT NULL,
    account_type TEXT NOT NULL,
    account_id TEXT NOT NULL,
    debit_amount TEXT NOT NULL DEFAULT '0',
    credit_amount TEXT NOT NULL DEFAULT '0',
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_journal_transaction_id ON journal_entries(transaction_id);
CREATE INDEX IF NOT EXISTS idx_journal_account ON journal_entries(account_type, account_id);
"#;

// users

pub const INSERT_USER: &str = r#"
INSERT INTO users (id, name, email, active, created_at, updated_at)
VALUES (?, ?, ?, 1, ?, ?)
"#;

pub const CHECK_USER_ID_PREFIX: &str = r#"
SELECT id FROM users WHERE id LIKE ? LIMIT 1
"#;

pub const GET_ACTIVE_USERS: &str = r#"
SELECT id, name, email, active, created_at, updated_at
FROM users
WHERE active = 1
ORDER BY created_at
"#;

pub const GET_USER_BY_ID: &str = r#"
SELECT id, name, email, active, created_at, updated_at
FROM users
WHERE id = ? AND active = 1
"#;

pub const GET_USER_BY_EMAIL: &str = r#"
SELECT id, name, email, active, created_at, updated_at
FROM users
WHERE email = ? AND active = 1
"#;

// addresses

pub const INSERT_ADDRESS: &str = r#"
INSERT INTO addresses (id, user_id, asset, network, address, wallet_id, account_identifier, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const GET_USER_ADDRESSES: &str = r#"
SELECT id, user_id, asset, network, address, wallet_id, account_identifier, created_at
FROM addresses
WHERE user_id = ? AND asset = ? AND network = ?
ORDER BY created_at DESC
"#;

pub const FIND_USER_BY_ADDRESS: &str = r#"
SELECT u.id AS user_id, u.name AS user_name, u.email AS user_email, u.active AS user_active,
       u.created_at AS user_created_at, u.updated_at AS user_updated_at,
       a.id AS address_id, a.asset, a.network, a.address,
       a.wallet_id, a.account_identifier, a.created_at AS address_created_at
FROM addresses a
JOIN users u ON u.id = a.user_id
WHERE u.active = 1 AND (a.account_identifier = ? OR a.address = ?)
ORDER BY a.created_at DESC
LIMIT 1
"#;

// account balances

pub const GET_BALANCE: &str = r#"
SELECT balance FROM account_balances WHERE user_id = ? AND asset = ?
"#;

pub const GET_BALANCE_FOR_UPDATE: &str = r#"
SELECT balance, version FROM account_balances WHERE user_id = ? AND asset = ?
"#;

pub const GET_USER_BALANCES: &str = r#"
SELECT id, user_id, asset, balance, last_transaction_id, version, updated_at
FROM account_balances
WHERE user_id = ?
ORDER BY asset
"#;

pub const INSERT_ACCOUNT_BALANCE: &str = r#"
INSERT INTO account_balances (id, user_id, asset, balance, version, updated_at)
VALUES (?, ?, ?, '0', 1, ?)
"#;

/// The optimistic-concurrency control point: the version predicate makes a
/// stale writer affect zero rows.
pub const UPDATE_ACCOUNT_BALANCE: &str = r#"
UPDATE account_balances
SET balance = ?, last_transaction_id = ?, version = version + 1, updated_at = ?
WHERE user_id = ? AND asset = ? AND version = ?
"#;

// transactions

pub const CHECK_DUPLICATE_TRANSACTION: &str = r#"
SELECT id FROM transactions WHERE external_transaction_id = ?
"#;

pub const INSERT_TRANSACTION: &str = r#"
INSERT INTO transactions
    (id, user_id, asset, transaction_type, amount, balance_before, balance_after,
     external_transaction_id, address, reference, status, created_at, processed_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
"#;

pub const GET_TRANSACTION_HISTORY: &str = r#"
SELECT id, user_id, asset, transaction_type, amount, balance_before, balance_after,
       external_transaction_id, address, reference, status, created_at, processed_at
FROM transactions
WHERE user_id = ? AND asset = ?
ORDER BY created_at DESC
LIMIT ? OFFSET ?
"#;

pub const GET_CONFIRMED_AMOUNTS: &str = r#"
SELECT amount FROM transactions
WHERE user_id = ? AND asset = ? AND status = 'confirmed'
"#;

pub const GET_MOST_RECENT_EXTERNAL_TX_TIME: &str = r#"
SELECT MAX(created_at) FROM transactions WHERE external_transaction_id != ''
"#;

// journal entries

pub const INSERT_JOURNAL_ENTRY: &str = r#"
INSERT INTO journal_entries (id, transaction_id, account_type, account_id, debit_amount, credit_amount, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#;

pub const GET_JOURNAL_ENTRIES: &str = r#"
SELECT id, transaction_id, account_type, account_id, debit_amount, credit_amount
FROM journal_entries
WHERE transaction_id = ?
ORDER BY rowid
"#;

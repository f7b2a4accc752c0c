//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Balance projections, keyed by `account_id`.
    pub const BALANCES: &str = "balances";

    /// Ledger transactions, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: transactions by account, keyed by `account_id || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_ACCOUNT: &str = "transactions_by_account";

    /// Unique constraint on idempotency keys, keyed by `account_id || key`.
    /// Value is the transaction ID written by the first call.
    pub const IDEMPOTENCY_KEYS: &str = "idempotency_keys";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::BALANCES,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_ACCOUNT,
        cf::IDEMPOTENCY_KEYS,
    ]
}

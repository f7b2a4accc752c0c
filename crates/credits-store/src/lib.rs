//! Storage layer and ledger operations for the credit ledger.
//!
//! This crate provides persistent storage for balances and transactions using
//! a `RocksDB` `TransactionDB`, plus the [`Ledger`] service that callers use.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `balances`: Balance projections, keyed by `account_id`
//! - `transactions`: Ledger rows, keyed by `transaction_id` (ULID)
//! - `transactions_by_account`: Index for listing transactions by account
//! - `idempotency_keys`: Unique constraint on `account_id || idempotency_key`
//!
//! Every mutation runs in one database transaction that locks the idempotency
//! key (if any) and then the balance row with `get_for_update`, so concurrent
//! writers for the same account serialize and an uncommitted write leaves no
//! trace.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use credits_core::{AccountId, CreditOptions, DebitOptions};
//! use credits_store::{Ledger, RocksStore};
//!
//! let store = RocksStore::open("/tmp/credits-db").unwrap();
//! let ledger = Ledger::new(Arc::new(store));
//!
//! let account_id = AccountId::generate();
//! ledger.credit(&account_id, 500, CreditOptions::purchase("cs_test_123")).unwrap();
//! ledger.debit(&account_id, 120, DebitOptions::consumption("Rank check")).unwrap();
//!
//! assert_eq!(ledger.get_balance(&account_id).unwrap().total_credits(), 380);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod ledger;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use ledger::{CreditReceipt, DebitReceipt, Ledger};
pub use rocks::RocksStore;

use credits_core::{AccountId, Balance, DebitOptions, Transaction, TransactionId};

/// The storage trait defining all database operations.
///
/// Mutating operations are atomic: either every row they touch is written or
/// none is.
pub trait Store: Send + Sync {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    /// Return the balance for an account, creating an empty one if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn ensure_balance(&self, account_id: &AccountId) -> Result<Balance>;

    /// Get the balance for an account without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, account_id: &AccountId) -> Result<Option<Balance>>;

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>>;

    /// List transactions for an account, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// Look up the transaction recorded for an idempotency key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_idempotency_key(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<TransactionId>>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Insert a positive transaction and add it to the balance atomically.
    ///
    /// The balance is created if absent. Returns the balance after the credit.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateKey` if the idempotency key was already used.
    /// - `StoreError::InvalidAmount` if the transaction is not a credit.
    fn commit_credit(&self, transaction: &Transaction) -> Result<Balance>;

    /// Draw `amount` from the balance and insert the matching transactions
    /// atomically.
    ///
    /// One negative transaction is written per credit bucket drawn, in
    /// [`credits_core::DEBIT_PRIORITY`] order. Returns the balance after the
    /// debit and the transactions written.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateKey` if the idempotency key was already used.
    /// - `StoreError::InsufficientCredits` if the balance is too low.
    fn commit_debit(
        &self,
        account_id: &AccountId,
        amount: i64,
        options: &DebitOptions,
    ) -> Result<(Balance, Vec<Transaction>)>;
}

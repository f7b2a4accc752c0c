//! Error types for ledger operations.

use crate::ids::IdError;
use crate::{AccountId, TransactionId};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors returned by the credit ledger.
///
/// Every variant is distinguishable so callers can map it to a specific
/// response; `Idempotency` in particular means "already applied" and is not a
/// failure from the caller's point of view.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A mutation with this idempotency key was already applied to the account.
    #[error("idempotency key already used: {key}")]
    Idempotency {
        /// The idempotency key supplied by the caller.
        key: String,
        /// The transaction created by the first, successful call.
        transaction_id: TransactionId,
    },

    /// A debit would drive the balance negative.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Total credits currently available.
        available: i64,
        /// Credits the debit asked for.
        required: i64,
    },

    /// The account has no ledger state.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account that was looked up.
        account_id: AccountId,
    },

    /// The amount or transaction type is not valid for the operation.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether this error means the operation had already been applied.
    #[must_use]
    pub const fn is_already_applied(&self) -> bool {
        matches!(self, Self::Idempotency { .. })
    }
}

//! Error types for ledger storage.

use credits_core::{LedgerError, TransactionId};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// A row lock could not be acquired in time.
    #[error("lock contention: {0}")]
    Contention(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Key that was looked up.
        id: String,
    },

    /// The idempotency key was already recorded for the account.
    #[error("duplicate idempotency key: {key}")]
    DuplicateKey {
        /// The idempotency key.
        key: String,
        /// Transaction written by the first call.
        transaction_id: TransactionId,
    },

    /// Insufficient credits for a debit.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Total credits available.
        available: i64,
        /// Credits required.
        required: i64,
    },

    /// Amount rejected by the balance projection.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        match err.kind() {
            rocksdb::ErrorKind::TimedOut | rocksdb::ErrorKind::Busy => {
                Self::Contention(err.into_string())
            }
            _ => Self::Database(err.into_string()),
        }
    }
}

impl From<LedgerError> for StoreError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientCredits {
                available,
                required,
            } => Self::InsufficientCredits {
                available,
                required,
            },
            LedgerError::Idempotency {
                key,
                transaction_id,
            } => Self::DuplicateKey {
                key,
                transaction_id,
            },
            LedgerError::AccountNotFound { account_id } => Self::NotFound {
                entity: "balance",
                id: account_id.to_string(),
            },
            LedgerError::Serialization(msg) => Self::Serialization(msg),
            LedgerError::Storage(msg) => Self::Database(msg),
            LedgerError::InvalidAmount(msg) => Self::InvalidAmount(msg),
            LedgerError::InvalidId(e) => Self::Serialization(e.to_string()),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey {
                key,
                transaction_id,
            } => Self::Idempotency {
                key,
                transaction_id,
            },
            StoreError::InsufficientCredits {
                available,
                required,
            } => Self::InsufficientCredits {
                available,
                required,
            },
            StoreError::InvalidAmount(msg) => Self::InvalidAmount(msg),
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::NotFound { entity, id } => Self::Storage(format!("{entity} not found: {id}")),
            StoreError::Database(msg) | StoreError::Contention(msg) => Self::Storage(msg),
        }
    }
}

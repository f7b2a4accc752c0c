//! Ledger transaction types.
//!
//! Transactions are the source of truth: every change to a balance is written
//! as one or more immutable transaction rows carrying the same delta.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, TransactionId};

/// The bucket of credits a transaction touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditType {
    /// Monthly allowance granted by a subscription plan.
    Subscription,

    /// Credits the customer paid for.
    Purchased,

    /// Promotional credits handed out by the platform.
    Bonus,
}

impl CreditType {
    /// Get the credit type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription => "subscription",
            Self::Purchased => "purchased",
            Self::Bonus => "bonus",
        }
    }
}

impl fmt::Display for CreditType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits bought through checkout.
    Purchase,

    /// Credits spent on a paid operation.
    Consumption,

    /// Credits returned to the customer.
    Refund,

    /// Manual correction by an operator (either direction).
    Adjustment,

    /// Credits granted by a plan renewal or an admin.
    Grant,
}

impl TransactionType {
    /// Get the transaction type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Purchase => "purchase",
            Self::Consumption => "consumption",
            Self::Refund => "refund",
            Self::Adjustment => "adjustment",
            Self::Grant => "grant",
        }
    }

    /// Check if this transaction type may add credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        matches!(
            self,
            Self::Purchase | Self::Refund | Self::Adjustment | Self::Grant
        )
    }

    /// Check if this transaction type may remove credits.
    #[must_use]
    pub const fn is_debit(&self) -> bool {
        matches!(self, Self::Consumption | Self::Adjustment)
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The account whose balance was affected.
    pub account_id: AccountId,

    /// Signed amount. Positive = credit, negative = debit. Never zero.
    pub amount: i64,

    /// The bucket this row moved credits in or out of.
    pub credit_type: CreditType,

    /// Why the row was written.
    pub transaction_type: TransactionType,

    /// Caller-supplied key that makes the mutation apply at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    /// Human-readable description.
    pub description: String,

    /// Additional context (feature, external event id, operator, ...).
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// When the transaction was created.
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a positive transaction from credit options.
    #[must_use]
    pub fn credit(account_id: AccountId, amount: i64, options: &CreditOptions) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount: amount.abs(),
            credit_type: options.credit_type,
            transaction_type: options.transaction_type,
            idempotency_key: options.idempotency_key.clone(),
            description: options.description.clone(),
            metadata: options.metadata.clone(),
            created_at: Utc::now(),
        }
    }

    /// Build a negative transaction drawing `amount` from one bucket.
    #[must_use]
    pub fn debit(
        account_id: AccountId,
        credit_type: CreditType,
        amount: i64,
        options: &DebitOptions,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            account_id,
            amount: -amount.abs(),
            credit_type,
            transaction_type: options.transaction_type,
            idempotency_key: options.idempotency_key.clone(),
            description: options.description.clone(),
            metadata: options.metadata.clone(),
            created_at: Utc::now(),
        }
    }

    /// Whether this row adds credits.
    #[must_use]
    pub const fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

/// Options for a credit (grant, purchase, refund, positive adjustment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditOptions {
    /// Bucket to add the credits to.
    pub credit_type: CreditType,
    /// Why the credits are added.
    pub transaction_type: TransactionType,
    /// Key identifying the external event, if any.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Additional context.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl CreditOptions {
    /// Credits bought through checkout, keyed on the external payment event.
    #[must_use]
    pub fn purchase(idempotency_key: impl Into<String>) -> Self {
        Self {
            credit_type: CreditType::Purchased,
            transaction_type: TransactionType::Purchase,
            idempotency_key: Some(idempotency_key.into()),
            description: "Credit purchase".to_string(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Monthly subscription allowance for a plan.
    #[must_use]
    pub fn subscription_grant(plan_name: &str, idempotency_key: impl Into<String>) -> Self {
        Self {
            credit_type: CreditType::Subscription,
            transaction_type: TransactionType::Grant,
            idempotency_key: Some(idempotency_key.into()),
            description: format!("Monthly {plan_name} plan credit grant"),
            metadata: serde_json::json!({ "plan": plan_name }),
        }
    }

    /// Bonus credits handed out by an operator. Each call is a new grant.
    #[must_use]
    pub fn bonus(reason: impl Into<String>) -> Self {
        Self {
            credit_type: CreditType::Bonus,
            transaction_type: TransactionType::Grant,
            idempotency_key: None,
            description: reason.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Refund of purchased credits.
    #[must_use]
    pub fn refund(reason: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            credit_type: CreditType::Purchased,
            transaction_type: TransactionType::Refund,
            idempotency_key: Some(idempotency_key.into()),
            description: reason.into(),
            metadata: serde_json::Value::Null,
        }
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Options for a debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebitOptions {
    /// Why the credits are removed.
    pub transaction_type: TransactionType,
    /// Key identifying the charged operation, if any.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Additional context.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Default for DebitOptions {
    fn default() -> Self {
        Self {
            transaction_type: TransactionType::Consumption,
            idempotency_key: None,
            description: "Credit consumption".to_string(),
            metadata: serde_json::Value::Null,
        }
    }
}

impl DebitOptions {
    /// Consumption by a paid operation.
    #[must_use]
    pub fn consumption(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    /// Set the idempotency key.
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Set the transaction type.
    #[must_use]
    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    /// Set metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

//! Request and response types for the credits client.

use serde::{Deserialize, Serialize};

use credits_core::Feature;

/// What to pay for: a priced feature or a raw credit amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Charge {
    /// Feature to price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature: Option<Feature>,
    /// Units of the feature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u64>,
    /// Raw credit amount.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

impl Charge {
    /// Charge for `quantity` units of a feature at the server's price.
    #[must_use]
    pub fn feature(feature: Feature, quantity: u64) -> Self {
        Self {
            feature: Some(feature),
            quantity: Some(quantity),
            amount: None,
        }
    }

    /// Charge a fixed number of credits.
    #[must_use]
    pub fn amount(amount: i64) -> Self {
        Self {
            amount: Some(amount),
            ..Self::default()
        }
    }
}

/// Credit check request.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRequest {
    /// Account to check.
    pub account_id: String,
    /// The charge being considered.
    #[serde(flatten)]
    pub charge: Charge,
}

/// Credit check response.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckResponse {
    /// Whether the balance covers the charge.
    pub sufficient: bool,
    /// Current total balance.
    pub total_credits: i64,
    /// Credits the charge would cost.
    pub required: i64,
}

/// Debit request.
#[derive(Debug, Clone, Serialize)]
pub struct DebitRequest {
    /// Account to charge.
    pub account_id: String,
    /// What is being paid for.
    #[serde(flatten)]
    pub charge: Charge,
    /// Key identifying the charged operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Description override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Additional context stored on the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Debit response.
#[derive(Debug, Clone, Deserialize)]
pub struct DebitResponse {
    /// Account charged.
    pub account_id: String,
    /// Credits removed by this call (0 for a replayed key).
    pub debited: i64,
    /// Balance after the debit.
    pub total_credits: i64,
    /// Transactions written, or the original one for a replayed key.
    pub transaction_ids: Vec<String>,
    /// Whether the idempotency key had already been applied.
    pub duplicate: bool,
}

/// Balance response.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Account ID.
    pub account_id: String,
    /// Subscription credits.
    pub subscription_credits: i64,
    /// Purchased credits.
    pub purchased_credits: i64,
    /// Bonus credits.
    pub bonus_credits: i64,
    /// Sum of all buckets.
    pub total_credits: i64,
    /// Credits ever added.
    pub lifetime_credited: i64,
    /// Credits ever removed.
    pub lifetime_debited: i64,
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}

//! Credit balance, transaction, check and debit handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credits_core::{
    AccountId, Balance, DebitOptions, Feature, LedgerError, PricingConfig, Transaction,
};

use crate::auth::{AuthUser, ServiceAuth};
use crate::error::ApiError;
use crate::state::AppState;

/// Maximum page size for transaction listings.
const MAX_PAGE_SIZE: usize = 100;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Account ID.
    pub account_id: String,
    /// Credits from the current subscription plan.
    pub subscription_credits: i64,
    /// Credits bought through checkout.
    pub purchased_credits: i64,
    /// Promotional credits.
    pub bonus_credits: i64,
    /// Sum of all buckets.
    pub total_credits: i64,
    /// Credits ever added.
    pub lifetime_credited: i64,
    /// Credits ever removed.
    pub lifetime_debited: i64,
    /// Last change.
    pub updated_at: String,
}

impl From<&Balance> for BalanceResponse {
    fn from(balance: &Balance) -> Self {
        Self {
            account_id: balance.account_id.to_string(),
            subscription_credits: balance.subscription_credits,
            purchased_credits: balance.purchased_credits,
            bonus_credits: balance.bonus_credits,
            total_credits: balance.total_credits(),
            lifetime_credited: balance.lifetime_credited,
            lifetime_debited: balance.lifetime_debited,
            updated_at: balance.updated_at.to_rfc3339(),
        }
    }
}

/// Get the caller's credit balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.ledger.get_balance(&auth.account_id)?;
    Ok(Json(BalanceResponse::from(&balance)))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Signed amount (positive = credit, negative = debit).
    pub amount: i64,
    /// Bucket touched.
    pub credit_type: String,
    /// Transaction type.
    pub transaction_type: String,
    /// Description.
    pub description: String,
    /// Idempotency key, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Additional context.
    pub metadata: serde_json::Value,
    /// Timestamp.
    pub created_at: String,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id.to_string(),
            amount: tx.amount,
            credit_type: tx.credit_type.to_string(),
            transaction_type: tx.transaction_type.to_string(),
            description: tx.description.clone(),
            idempotency_key: tx.idempotency_key.clone(),
            metadata: tx.metadata.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the caller's transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(MAX_PAGE_SIZE);
    let transactions = match state
        .ledger
        .transactions(&auth.account_id, limit + 1, query.offset)
    {
        Ok(transactions) => transactions,
        Err(LedgerError::AccountNotFound { .. }) => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// What a caller wants to pay for: a priced feature or a raw amount.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Charge {
    /// Feature to price.
    #[serde(default)]
    pub feature: Option<Feature>,
    /// Units of the feature (default: 1).
    #[serde(default)]
    pub quantity: Option<u64>,
    /// Raw credit amount, when no feature is given.
    #[serde(default)]
    pub amount: Option<i64>,
}

impl Charge {
    /// Resolve the charge to a credit amount.
    pub fn cost(&self, pricing: &PricingConfig) -> Result<i64, ApiError> {
        match (self.feature, self.amount) {
            (Some(_), Some(_)) => Err(ApiError::BadRequest(
                "specify either feature or amount, not both".into(),
            )),
            (Some(feature), None) => {
                let quantity = self.quantity.unwrap_or(1);
                if quantity == 0 {
                    return Err(ApiError::BadRequest("quantity must be positive".into()));
                }
                Ok(pricing.cost_for(feature, quantity))
            }
            (None, Some(amount)) if amount > 0 => Ok(amount),
            (None, Some(amount)) => Err(ApiError::BadRequest(format!(
                "amount must be positive, got {amount}"
            ))),
            (None, None) => Err(ApiError::BadRequest(
                "either feature or amount is required".into(),
            )),
        }
    }

    fn describe(&self) -> String {
        match self.feature {
            Some(feature) => format!("{feature} x{}", self.quantity.unwrap_or(1)),
            None => "Credit consumption".to_string(),
        }
    }
}

/// Credit check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    /// Account to check.
    pub account_id: AccountId,
    /// The charge being considered.
    #[serde(flatten)]
    pub charge: Charge,
}

/// Credit check response.
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    /// Whether the balance covers the charge.
    pub sufficient: bool,
    /// Current total balance.
    pub total_credits: i64,
    /// Credits the charge would cost.
    pub required: i64,
}

/// Check whether an account can afford a charge (service auth).
pub async fn check_credits(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Json(body): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, ApiError> {
    let required = body.charge.cost(&state.config.pricing)?;
    let balance = state.ledger.get_balance(&body.account_id)?;
    let sufficient = balance.has_sufficient_credits(required);

    tracing::debug!(
        service = %service.service_name,
        account_id = %body.account_id,
        required = required,
        sufficient = sufficient,
        "Credit check"
    );

    Ok(Json(CheckResponse {
        sufficient,
        total_credits: balance.total_credits(),
        required,
    }))
}

/// Debit request.
#[derive(Debug, Deserialize)]
pub struct DebitRequest {
    /// Account to charge.
    pub account_id: AccountId,
    /// What is being paid for.
    #[serde(flatten)]
    pub charge: Charge,
    /// Key identifying the charged operation; retries with the same key charge once.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Description override.
    #[serde(default)]
    pub description: Option<String>,
    /// Additional context stored on the transaction.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Debit response.
#[derive(Debug, Serialize)]
pub struct DebitResponse {
    /// Account charged.
    pub account_id: String,
    /// Credits removed by this call (0 for a replayed key).
    pub debited: i64,
    /// Balance after the debit.
    pub total_credits: i64,
    /// Transactions written (or, for a replayed key, the original one).
    pub transaction_ids: Vec<String>,
    /// Whether the idempotency key had already been applied.
    pub duplicate: bool,
}

/// Charge credits for an operation (service auth).
pub async fn debit_credits(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Json(body): Json<DebitRequest>,
) -> Result<Json<DebitResponse>, ApiError> {
    let amount = body.charge.cost(&state.config.pricing)?;

    let mut metadata = body
        .metadata
        .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
    if let Some(map) = metadata.as_object_mut() {
        map.entry("service")
            .or_insert_with(|| service.service_name.clone().into());
        if let Some(feature) = body.charge.feature {
            map.entry("feature")
                .or_insert_with(|| feature.as_str().into());
            map.entry("quantity")
                .or_insert_with(|| body.charge.quantity.unwrap_or(1).into());
        }
    }

    let mut options = DebitOptions::consumption(
        body.description
            .clone()
            .unwrap_or_else(|| body.charge.describe()),
    )
    .with_metadata(metadata);
    if let Some(key) = &body.idempotency_key {
        options = options.with_idempotency_key(key.clone());
    }

    match state.ledger.debit(&body.account_id, amount, options) {
        Ok(receipt) => Ok(Json(DebitResponse {
            account_id: body.account_id.to_string(),
            debited: receipt.debited(),
            total_credits: receipt.balance.total_credits(),
            transaction_ids: receipt
                .transaction_ids()
                .iter()
                .map(ToString::to_string)
                .collect(),
            duplicate: false,
        })),
        Err(LedgerError::Idempotency {
            key,
            transaction_id,
        }) => {
            tracing::info!(
                service = %service.service_name,
                account_id = %body.account_id,
                idempotency_key = %key,
                "Debit already applied"
            );
            let balance = state.ledger.get_balance(&body.account_id)?;
            Ok(Json(DebitResponse {
                account_id: body.account_id.to_string(),
                debited: 0,
                total_credits: balance.total_credits(),
                transaction_ids: vec![transaction_id.to_string()],
                duplicate: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_charge_uses_pricing() {
        let pricing = PricingConfig::default();
        let charge = Charge {
            feature: Some(Feature::ReviewImport),
            quantity: Some(25),
            amount: None,
        };
        assert_eq!(charge.cost(&pricing).unwrap(), 3);
        assert_eq!(charge.describe(), "review_import x25");
    }

    #[test]
    fn raw_amount_must_be_positive() {
        let pricing = PricingConfig::default();
        let charge = Charge {
            amount: Some(0),
            ..Charge::default()
        };
        assert!(matches!(
            charge.cost(&pricing),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn feature_and_amount_are_exclusive() {
        let charge = Charge {
            feature: Some(Feature::RankCheck),
            quantity: None,
            amount: Some(4),
        };
        assert!(charge.cost(&PricingConfig::default()).is_err());
        assert!(Charge::default().cost(&PricingConfig::default()).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let charge = Charge {
            feature: Some(Feature::RankCheck),
            quantity: Some(0),
            amount: None,
        };
        assert!(charge.cost(&PricingConfig::default()).is_err());
    }
}

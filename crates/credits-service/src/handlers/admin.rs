//! Operator endpoints: grants, adjustments and audits.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use credits_core::{
    AccountId, AuditReport, CreditOptions, CreditType, DebitOptions, LedgerError,
    TransactionType,
};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::handlers::credits::{BalanceResponse, TransactionResponse};
use crate::state::AppState;

/// Grant request.
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    /// Account to credit.
    pub account_id: AccountId,
    /// Credits to add.
    pub amount: i64,
    /// Bucket to credit (default: bonus).
    #[serde(default)]
    pub credit_type: Option<CreditType>,
    /// Why the credits are granted.
    pub reason: String,
}

/// Response for operations that write ledger rows.
#[derive(Debug, Serialize)]
pub struct LedgerWriteResponse {
    /// Transactions written (or, for a replayed key, the original one).
    pub transactions: Vec<TransactionResponse>,
    /// Balance after the write.
    pub balance: BalanceResponse,
    /// Whether the idempotency key had already been applied.
    pub duplicate: bool,
}

/// Grant credits to an account.
///
/// Grants carry no idempotency key: every call adds credits.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantRequest>,
) -> Result<Json<LedgerWriteResponse>, ApiError> {
    let credit_type = body.credit_type.unwrap_or(CreditType::Bonus);
    let options = CreditOptions {
        credit_type,
        transaction_type: TransactionType::Grant,
        idempotency_key: None,
        description: body.reason.clone(),
        metadata: serde_json::json!({ "admin_id": admin.admin_id }),
    };

    let receipt = state.ledger.credit(&body.account_id, body.amount, options)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %body.account_id,
        amount = body.amount,
        credit_type = %credit_type,
        reason = %body.reason,
        "Admin granted credits"
    );

    Ok(Json(LedgerWriteResponse {
        transactions: vec![TransactionResponse::from(&receipt.transaction)],
        balance: BalanceResponse::from(&receipt.balance),
        duplicate: false,
    }))
}

/// Adjustment request.
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Account to correct.
    pub account_id: AccountId,
    /// Signed correction. Positive adds, negative removes.
    pub amount: i64,
    /// Bucket for positive corrections (default: purchased). Negative
    /// corrections drain buckets in the usual debit order.
    #[serde(default)]
    pub credit_type: Option<CreditType>,
    /// Why the balance is corrected.
    pub reason: String,
    /// Key making the correction apply once.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Correct an account's balance in either direction.
pub async fn adjust_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<AdjustRequest>,
) -> Result<Json<LedgerWriteResponse>, ApiError> {
    let metadata = serde_json::json!({ "admin_id": admin.admin_id });

    let result = match body.amount {
        0 => return Err(ApiError::BadRequest("adjustment amount must be non-zero".into())),
        amount if amount > 0 => {
            let options = CreditOptions {
                credit_type: body.credit_type.unwrap_or(CreditType::Purchased),
                transaction_type: TransactionType::Adjustment,
                idempotency_key: body.idempotency_key.clone(),
                description: body.reason.clone(),
                metadata,
            };
            state
                .ledger
                .credit(&body.account_id, amount, options)
                .map(|r| (vec![r.transaction], r.balance))
        }
        amount => {
            let mut options = DebitOptions::consumption(body.reason.clone())
                .with_transaction_type(TransactionType::Adjustment)
                .with_metadata(metadata);
            if let Some(key) = &body.idempotency_key {
                options = options.with_idempotency_key(key.clone());
            }
            state
                .ledger
                .debit(&body.account_id, amount.saturating_neg(), options)
                .map(|r| (r.transactions, r.balance))
        }
    };

    match result {
        Ok((transactions, balance)) => {
            tracing::info!(
                admin_id = %admin.admin_id,
                account_id = %body.account_id,
                amount = body.amount,
                reason = %body.reason,
                "Admin adjusted credits"
            );
            Ok(Json(LedgerWriteResponse {
                transactions: transactions.iter().map(TransactionResponse::from).collect(),
                balance: BalanceResponse::from(&balance),
                duplicate: false,
            }))
        }
        Err(LedgerError::Idempotency { transaction_id, .. }) => {
            let original = state.ledger.transaction(&transaction_id)?;
            let balance = state.ledger.get_balance(&body.account_id)?;
            Ok(Json(LedgerWriteResponse {
                transactions: original.iter().map(TransactionResponse::from).collect(),
                balance: BalanceResponse::from(&balance),
                duplicate: true,
            }))
        }
        Err(e) => Err(e.into()),
    }
}

/// Recompute an account's balance from its transaction log.
pub async fn audit_account(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Path(account_id): Path<String>,
) -> Result<Json<AuditReport>, ApiError> {
    let account_id: AccountId = account_id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid account id: {account_id}")))?;

    let report = state.ledger.audit(&account_id)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        account_id = %account_id,
        consistent = report.is_consistent(),
        transaction_count = report.transaction_count,
        "Audit requested"
    );

    Ok(Json(report))
}

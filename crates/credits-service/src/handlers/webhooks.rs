//! Stripe webhook handler.
//!
//! Each handled event credits the ledger with the event id as idempotency
//! key, so Stripe's at-least-once delivery applies every event exactly once.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use credits_core::{AccountId, CreditOptions, LedgerError, Plan};

use crate::crypto::verify_stripe_signature;
use crate::error::ApiError;
use crate::state::AppState;

/// Stripe webhook payload (simplified).
#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event ID.
    pub id: String,
    /// Event data.
    pub data: StripeEventData,
}

/// Stripe event data container.
#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    /// Event object.
    pub object: Value,
}

/// Webhook response.
#[derive(Debug, Default, Serialize)]
pub struct WebhookResponse {
    /// Whether the webhook was accepted.
    pub received: bool,
    /// Whether the event had already been applied.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// What handling an event did to the ledger.
enum Outcome {
    Applied,
    Duplicate,
    Ignored,
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    if let Some(secret) = &state.config.stripe_webhook_secret {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest("Missing Stripe signature".into()))?;

        verify_stripe_signature(secret, &body, signature, chrono::Utc::now().timestamp())
            .map_err(|e| {
                tracing::warn!(error = %e, "Invalid Stripe webhook signature");
                ApiError::BadRequest("Invalid webhook signature".into())
            })?;
    } else {
        tracing::warn!("Stripe webhook secret not configured - skipping signature verification");
    }

    let webhook: StripeWebhook =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_type = %webhook.event_type,
        event_id = %webhook.id,
        "Received Stripe webhook"
    );

    let object = &webhook.data.object;
    let outcome = match webhook.event_type.as_str() {
        "checkout.session.completed" => handle_checkout_completed(&state, &webhook.id, object)?,
        "invoice.paid" => handle_invoice_paid(&state, &webhook.id, object)?,
        "charge.refunded" => handle_charge_refunded(&state, &webhook.id, object)?,
        _ => {
            tracing::debug!(event_type = %webhook.event_type, "Unhandled Stripe event");
            Outcome::Ignored
        }
    };

    Ok(Json(WebhookResponse {
        received: true,
        duplicate: matches!(outcome, Outcome::Duplicate),
    }))
}

fn handle_checkout_completed(
    state: &AppState,
    event_id: &str,
    session: &Value,
) -> Result<Outcome, ApiError> {
    let session_id = str_field(session, "id").unwrap_or("unknown");
    let payment_status = str_field(session, "payment_status").unwrap_or("unknown");

    if payment_status != "paid" {
        tracing::info!(
            session_id = %session_id,
            payment_status = %payment_status,
            "Checkout session not paid yet, skipping"
        );
        return Ok(Outcome::Ignored);
    }

    let account_id = parse_account(str_field(session, "client_reference_id"))?;
    let amount_total = session.get("amount_total").and_then(Value::as_i64);
    let credits = metadata_i64(session, "credits")
        .or(amount_total)
        .ok_or_else(|| ApiError::BadRequest("Checkout session carries no credit amount".into()))?;

    let options = CreditOptions::purchase(event_id)
        .with_description(format!("Credit purchase ({session_id})"))
        .with_metadata(serde_json::json!({
            "stripe_event_id": event_id,
            "checkout_session_id": session_id,
            "payment_intent": str_field(session, "payment_intent"),
            "amount_total": amount_total,
        }));

    apply_credit(state, &account_id, credits, options)
}

fn handle_invoice_paid(
    state: &AppState,
    event_id: &str,
    invoice: &Value,
) -> Result<Outcome, ApiError> {
    let invoice_id = str_field(invoice, "id").unwrap_or("unknown");
    let metadata = invoice_metadata(invoice);

    let plan: Plan = metadata
        .and_then(|m| str_field(m, "plan"))
        .ok_or_else(|| ApiError::BadRequest("Invoice has no plan metadata".into()))?
        .parse()
        .map_err(ApiError::BadRequest)?;
    let account_id = parse_account(metadata.and_then(|m| str_field(m, "account_id")))?;

    let credits = plan.monthly_credits();
    if credits == 0 {
        tracing::info!(invoice_id = %invoice_id, plan = %plan.as_str(), "Plan grants no credits");
        return Ok(Outcome::Ignored);
    }

    let options = CreditOptions::subscription_grant(plan.as_str(), event_id).with_metadata(
        serde_json::json!({
            "plan": plan.as_str(),
            "stripe_event_id": event_id,
            "invoice_id": invoice_id,
        }),
    );

    apply_credit(state, &account_id, credits, options)
}

fn handle_charge_refunded(
    state: &AppState,
    event_id: &str,
    charge: &Value,
) -> Result<Outcome, ApiError> {
    let charge_id = str_field(charge, "id").unwrap_or("unknown");

    let refund_credits = charge
        .get("metadata")
        .and_then(|m| str_field(m, "refund_credits"))
        == Some("true");
    let credits = metadata_i64(charge, "credits");

    let (true, Some(credits)) = (refund_credits, credits) else {
        tracing::info!(charge_id = %charge_id, "Charge refunded without credit refund");
        return Ok(Outcome::Ignored);
    };

    let account_id = parse_account(charge.get("metadata").and_then(|m| str_field(m, "account_id")))?;

    let options = CreditOptions::refund(format!("Refund ({charge_id})"), event_id).with_metadata(
        serde_json::json!({
            "stripe_event_id": event_id,
            "charge_id": charge_id,
        }),
    );

    apply_credit(state, &account_id, credits, options)
}

fn apply_credit(
    state: &AppState,
    account_id: &AccountId,
    amount: i64,
    options: CreditOptions,
) -> Result<Outcome, ApiError> {
    if amount <= 0 {
        tracing::warn!(
            account_id = %account_id,
            amount = amount,
            event_id = ?options.idempotency_key,
            "Stripe event carries no positive credit amount, skipping"
        );
        return Ok(Outcome::Ignored);
    }

    match state.ledger.credit(account_id, amount, options) {
        Ok(_) => Ok(Outcome::Applied),
        Err(LedgerError::Idempotency { key, .. }) => {
            tracing::info!(account_id = %account_id, event_id = %key, "Stripe event already applied");
            Ok(Outcome::Duplicate)
        }
        Err(e) => Err(e.into()),
    }
}

fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str)
}

/// Read an integer from `metadata`; Stripe stores metadata values as strings.
fn metadata_i64(object: &Value, name: &str) -> Option<i64> {
    let value = object.get("metadata")?.get(name)?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Invoice metadata, falling back to the subscription's metadata.
fn invoice_metadata(invoice: &Value) -> Option<&Value> {
    invoice
        .get("metadata")
        .filter(|m| m.get("plan").is_some())
        .or_else(|| invoice.get("subscription_details")?.get("metadata"))
}

fn parse_account(raw: Option<&str>) -> Result<AccountId, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::BadRequest("Missing account reference".into()))?;
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid account id: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_numbers_may_be_strings() {
        let object = json!({ "metadata": { "credits": "500", "other": 7 } });
        assert_eq!(metadata_i64(&object, "credits"), Some(500));
        assert_eq!(metadata_i64(&object, "other"), Some(7));
        assert_eq!(metadata_i64(&object, "missing"), None);
    }

    #[test]
    fn invoice_metadata_falls_back_to_subscription() {
        let invoice = json!({
            "metadata": {},
            "subscription_details": { "metadata": { "plan": "growth" } }
        });
        assert_eq!(
            invoice_metadata(&invoice).and_then(|m| str_field(m, "plan")),
            Some("growth")
        );
    }

    #[test]
    fn account_reference_is_validated() {
        assert!(parse_account(None).is_err());
        assert!(parse_account(Some("not-a-uuid")).is_err());
        let id = AccountId::generate();
        assert_eq!(parse_account(Some(&id.to_string())).unwrap(), id);
    }
}

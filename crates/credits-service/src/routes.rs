//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, credits, health, webhooks};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Credits (tenant JWT auth)
/// - `GET /v1/credits/balance` - Get current balance
/// - `GET /v1/credits/transactions` - List transaction history
///
/// ## Credits (service API key auth)
/// - `POST /v1/credits/check` - Check whether a charge is affordable
/// - `POST /v1/credits/debit` - Charge credits
///
/// ## Admin (admin API key auth)
/// - `POST /v1/admin/credits/grant` - Grant credits
/// - `POST /v1/admin/credits/adjust` - Correct a balance in either direction
/// - `GET /v1/admin/accounts/:account_id/audit` - Recompute balance from the log
///
/// ## Webhooks (signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Credits
        .route("/v1/credits/balance", get(credits::get_balance))
        .route("/v1/credits/transactions", get(credits::list_transactions))
        .route("/v1/credits/check", post(credits::check_credits))
        .route("/v1/credits/debit", post(credits::debit_credits))
        // Admin
        .route("/v1/admin/credits/grant", post(admin::grant_credits))
        .route("/v1/admin/credits/adjust", post(admin::adjust_credits))
        .route(
            "/v1/admin/accounts/:account_id/audit",
            get(admin::audit_account),
        )
        // Webhooks
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Middleware (outermost first)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(request_timeout_seconds)))
                .layer(cors)
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

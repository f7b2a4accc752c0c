//! Credits Service - HTTP API for the credit ledger
//!
//! This is the main entry point for the credits service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credits_service::{create_router, AppState, ServiceConfig};
use credits_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,credits=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Credits Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        lock_timeout_ms = config.lock_timeout_ms,
        jwt_configured = config.auth_jwt_secret.is_some(),
        service_key_configured = config.service_api_key.is_some(),
        admin_key_configured = config.admin_api_key.is_some(),
        stripe_webhooks_verified = config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = RocksStore::open_with_lock_timeout(&config.data_dir, config.lock_timeout_ms)?;

    let state = AppState::new(Arc::new(store), config.clone());

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

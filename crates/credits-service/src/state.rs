//! Application state.

use std::sync::Arc;

use credits_store::{Ledger, Store};

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The credit ledger.
    pub ledger: Ledger,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state over a storage backend.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        if config.auth_jwt_secret.is_none() {
            tracing::warn!("AUTH_JWT_SECRET not configured - tenant endpoints will reject all tokens");
        }
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin endpoints are disabled");
        }

        Self {
            ledger: Ledger::new(store),
            config,
        }
    }
}

//! Common test utilities for credits service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tempfile::TempDir;

use credits_core::AccountId;
use credits_service::auth::JwtClaims;
use credits_service::{create_router, AppState, ServiceConfig};
use credits_store::RocksStore;

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const AUDIENCE: &str = "credits";
pub const SERVICE_API_KEY: &str = "test-service-key";
pub const ADMIN_API_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test account for authenticated requests.
    pub account_id: AccountId,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness that verifies Stripe webhook signatures.
    pub fn with_webhook_secret() -> Self {
        Self::with_config(|config| {
            config.stripe_webhook_secret = Some(WEBHOOK_SECRET.into());
        })
    }

    /// Create a harness after adjusting the test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            auth_jwt_secret: Some(JWT_SECRET.into()),
            auth_audience: AUDIENCE.into(),
            service_api_key: Some(SERVICE_API_KEY.into()),
            admin_api_key: Some(ADMIN_API_KEY.into()),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            _temp_dir: temp_dir,
            account_id: AccountId::generate(),
        }
    }

    /// Bearer header for the harness account.
    pub fn user_auth_header(&self) -> String {
        Self::auth_header_for(&self.account_id)
    }

    /// Bearer header for any account.
    pub fn auth_header_for(account_id: &AccountId) -> String {
        format!("Bearer {}", mint_token(&account_id.to_string(), AUDIENCE, JWT_SECRET))
    }

    /// Grant credits through the admin API.
    pub async fn grant(&self, account_id: &AccountId, amount: i64, credit_type: &str) {
        self.server
            .post("/v1/admin/credits/grant")
            .add_header("x-admin-key", ADMIN_API_KEY)
            .json(&json!({
                "account_id": account_id.to_string(),
                "amount": amount,
                "credit_type": credit_type,
                "reason": "test grant"
            }))
            .await
            .assert_status_ok();
    }

    /// Read the total balance through the tenant API.
    pub async fn total_credits(&self, account_id: &AccountId) -> i64 {
        let response = self
            .server
            .get("/v1/credits/balance")
            .add_header("authorization", Self::auth_header_for(account_id))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        body["total_credits"].as_i64().expect("total_credits")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Mint an HS256 token.
pub fn mint_token(subject: &str, audience: &str, secret: &str) -> String {
    let claims = JwtClaims {
        sub: subject.to_string(),
        aud: Some(json!(audience)),
        exp: chrono::Utc::now().timestamp() + 3600,
        iat: Some(chrono::Utc::now().timestamp()),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("Failed to encode token")
}

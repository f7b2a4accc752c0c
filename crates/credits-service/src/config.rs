//! Service configuration.

use serde::Deserialize;
use std::path::Path;

use credits_core::PricingConfig;
use credits_store::rocks::DEFAULT_LOCK_TIMEOUT_MS;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/credits").
    pub data_dir: String,

    /// How long a ledger write waits for a contended balance row.
    pub lock_timeout_ms: i64,

    /// HS256 secret for tenant JWTs. Tenant routes reject every token when unset.
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "credits").
    pub auth_audience: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for operator endpoints.
    pub admin_api_key: Option<String>,

    /// Stripe webhook signing secret (optional).
    pub stripe_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Feature pricing.
    pub pricing: PricingConfig,
}

/// Stripe secrets file structure.
#[derive(Debug, Deserialize)]
struct StripeSecrets {
    webhook_secret: String,
}

impl ServiceConfig {
    /// Load configuration from environment variables and secrets files.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            lock_timeout_ms: parse_env("LEDGER_LOCK_TIMEOUT_MS").unwrap_or(defaults.lock_timeout_ms),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or(defaults.auth_audience),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            stripe_webhook_secret: load_stripe_webhook_secret(),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| parse_origins(&s))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: parse_env("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: parse_env("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
            pricing: defaults.pricing,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/credits".into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            auth_jwt_secret: None,
            auth_audience: "credits".into(),
            service_api_key: None,
            admin_api_key: None,
            stripe_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
            pricing: PricingConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = %name, value = %raw, "Ignoring unparsable setting");
            None
        }
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Load the Stripe webhook secret from file or environment.
fn load_stripe_webhook_secret() -> Option<String> {
    let secret_paths = [".secrets/stripe.json", "../.secrets/stripe.json"];

    for path in &secret_paths {
        if let Ok(secrets) = load_secrets_file::<StripeSecrets>(path) {
            tracing::info!(path = %path, "Loaded Stripe secrets from file");
            return Some(secrets.webhook_secret);
        }
    }

    tracing::debug!("Stripe secrets file not found, using environment variables");
    std::env::var("STRIPE_WEBHOOK_SECRET").ok()
}

/// Load secrets from a JSON file.
fn load_secrets_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Secrets file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable() {
        let config = ServiceConfig::default();
        assert_eq!(config.lock_timeout_ms, 5_000);
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
        assert!(config.admin_api_key.is_none());
    }

    #[test]
    fn origins_are_trimmed() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn secrets_file_is_parsed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stripe.json");
        std::fs::write(&path, r#"{"webhook_secret":"whsec_123"}"#).unwrap();

        let secrets: StripeSecrets = load_secrets_file(path.to_str().unwrap()).unwrap();
        assert_eq!(secrets.webhook_secret, "whsec_123");
    }

    #[test]
    fn missing_secrets_file_is_not_found() {
        let err = load_secrets_file::<StripeSecrets>("/nonexistent/stripe.json").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}

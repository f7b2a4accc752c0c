//! Credits HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use credits_core::{AccountId, Feature};

use crate::error::ClientError;
use crate::types::{
    ApiErrorResponse, BalanceResponse, Charge, CheckRequest, CheckResponse, DebitRequest,
    DebitResponse,
};

/// Credits API client.
///
/// Provides methods for checking and charging credits.
#[derive(Debug, Clone)]
pub struct CreditsClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl CreditsClient {
    /// Create a new credits client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the credits service (e.g., `"http://credits:8080"`)
    /// * `api_key` - Service API key for authentication
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new credits client with custom options.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        })
    }

    /// Check whether an account can afford a charge.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn check(
        &self,
        account_id: &AccountId,
        charge: Charge,
    ) -> Result<CheckResponse, ClientError> {
        let request = CheckRequest {
            account_id: account_id.to_string(),
            charge,
        };
        self.post("/v1/credits/check", &request).await
    }

    /// Charge credits.
    ///
    /// A replayed idempotency key returns the original charge with
    /// `duplicate` set instead of charging again.
    ///
    /// # Errors
    ///
    /// - `ClientError::InsufficientCredits` if the balance is too low.
    /// - Any other error if the request fails or the server returns an error.
    pub async fn debit(&self, request: DebitRequest) -> Result<DebitResponse, ClientError> {
        let response: DebitResponse = self.post("/v1/credits/debit", &request).await?;

        tracing::debug!(
            account_id = %request.account_id,
            debited = response.debited,
            duplicate = response.duplicate,
            "Credits debited"
        );

        Ok(response)
    }

    /// Charge for `quantity` units of a feature.
    ///
    /// This is a convenience method that constructs a debit request for a
    /// priced feature.
    ///
    /// # Errors
    ///
    /// Same as [`CreditsClient::debit`].
    pub async fn charge_feature(
        &self,
        account_id: &AccountId,
        feature: Feature,
        quantity: u64,
        idempotency_key: Option<&str>,
    ) -> Result<DebitResponse, ClientError> {
        self.debit(DebitRequest {
            account_id: account_id.to_string(),
            charge: Charge::feature(feature, quantity),
            idempotency_key: idempotency_key.map(String::from),
            description: None,
            metadata: None,
        })
        .await
    }

    /// Get a tenant's current balance (requires the tenant's JWT, not the service API key).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_balance(&self, user_jwt: &str) -> Result<BalanceResponse, ClientError> {
        let url = format!("{}/v1/credits/balance", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("authorization", format!("Bearer {user_jwt}"))
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn post<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{path}", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let detail = |name: &str| {
                    api_error
                        .error
                        .details
                        .as_ref()
                        .and_then(|d| d.get(name))
                        .and_then(serde_json::Value::as_i64)
                        .unwrap_or(0)
                };

                match api_error.error.code.as_str() {
                    "insufficient_credits" => Err(ClientError::InsufficientCredits {
                        available: detail("available"),
                        required: detail("required"),
                    }),
                    "not_found" => Err(ClientError::AccountNotFound {
                        message: api_error.error.message.clone(),
                    }),
                    code => Err(ClientError::Api {
                        code: code.to_string(),
                        message: api_error.error.message.clone(),
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = CreditsClient::new("http://localhost:8080/", "test-api-key").unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions::with_service_name("review-importer");
        let client = CreditsClient::with_options("http://localhost:8080", "key", options).unwrap();
        assert_eq!(client.service_name, "review-importer");
    }
}

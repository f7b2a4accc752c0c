//! Authentication extractors.
//!
//! This module provides extractors for:
//! - `AuthUser` - Tenant authentication via HS256 JWT
//! - `ServiceAuth` - Service-to-service authentication via API key
//! - `AdminAuth` - Admin authentication for privileged endpoints

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use credits_core::AccountId;

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// A tenant authenticated by a bearer JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The account the token was issued for.
    pub account_id: AccountId,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = header_value(parts, "authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, state)?;

        let account_id = claims.sub.parse::<AccountId>().map_err(|e| {
            tracing::debug!(error = %e, "JWT subject is not an account id");
            ApiError::Unauthorized
        })?;

        Ok(AuthUser { account_id })
    }
}

/// Service authentication via API key.
///
/// Used by feature services that check and debit credits.
#[derive(Debug, Clone)]
pub struct ServiceAuth {
    /// The service name or identifier.
    pub service_name: String,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for ServiceAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = header_value(parts, "x-api-key").ok_or(ApiError::Unauthorized)?;
        check_key(api_key, state.config.service_api_key.as_deref())?;

        let service_name = header_value(parts, "x-service-name")
            .unwrap_or("unknown")
            .to_string();

        Ok(ServiceAuth { service_name })
    }
}

/// Admin authentication via the `x-admin-key` header.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Admin identifier (for audit logging).
    pub admin_id: String,
}

#[async_trait::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let admin_key = header_value(parts, "x-admin-key").ok_or(ApiError::Unauthorized)?;
        check_key(admin_key, state.config.admin_api_key.as_deref())?;

        let admin_id = header_value(parts, "x-admin-id")
            .unwrap_or("admin")
            .to_string();

        tracing::info!(admin_id = %admin_id, "Admin authenticated");

        Ok(AdminAuth { admin_id })
    }
}

/// JWT claims accepted on tenant routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (account id).
    pub sub: String,
    /// Audience (can be string or array).
    #[serde(default)]
    pub aud: Option<serde_json::Value>,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    #[serde(default)]
    pub iat: Option<i64>,
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Compare a presented key with the configured one.
///
/// An unconfigured key disables the route.
fn check_key(presented: &str, expected: Option<&str>) -> Result<(), ApiError> {
    let expected = expected.ok_or(ApiError::Unauthorized)?;
    if constant_time_eq(presented, expected) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let secret = state
        .config
        .auth_jwt_secret
        .as_deref()
        .ok_or(ApiError::Unauthorized)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&state.config.auth_audience]);

    let token_data = decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!(error = %e, "JWT validation failed");
        ApiError::Unauthorized
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_key_is_unauthorized() {
        assert!(matches!(
            check_key("anything", None),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn wrong_key_is_forbidden() {
        assert!(matches!(
            check_key("wrong", Some("right")),
            Err(ApiError::Forbidden)
        ));
        assert!(check_key("right", Some("right")).is_ok());
    }
}

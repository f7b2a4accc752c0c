//! Credit ledger HTTP API service.
//!
//! This crate exposes the ledger over HTTP:
//!
//! - Balance and transaction history for tenants
//! - Credit checks and debits for feature services
//! - Manual grants, adjustments and audits for operators
//! - Stripe webhooks that credit purchases and plan renewals
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **JWT bearer tokens** (HS256, `sub` = account id) for tenant requests
//! 2. **Service API keys** (`x-api-key`) for feature services
//! 3. **Admin API keys** (`x-admin-key`) for operator endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers call the synchronous ledger directly

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

//! Credits Client SDK.
//!
//! This crate provides a client library for feature services to check and
//! charge credits through the credits API.
//!
//! # Example
//!
//! ```no_run
//! use credits_client::{ClientOptions, CreditsClient};
//! use credits_core::{AccountId, Feature};
//!
//! # async fn example(account_id: AccountId) -> Result<(), credits_client::ClientError> {
//! let client = CreditsClient::with_options(
//!     "http://credits.internal:8080",
//!     "your-service-api-key",
//!     ClientOptions::with_service_name("rank-tracker"),
//! )?;
//!
//! // Charge for three rank checks; retries with the same key charge once.
//! let response = client
//!     .charge_feature(&account_id, Feature::RankCheck, 3, Some("job-42"))
//!     .await?;
//!
//! println!("Remaining: {} credits", response.total_credits);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, CreditsClient};
pub use error::ClientError;
pub use types::*;

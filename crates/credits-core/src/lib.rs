//! Core types for the credit ledger.
//!
//! This crate provides the types shared by the store, the HTTP service and the
//! client SDK:
//!
//! - **Identifiers**: `AccountId`, `TransactionId`
//! - **Transactions**: `Transaction`, `CreditType`, `TransactionType`, `CreditOptions`, `DebitOptions`
//! - **Balances**: `Balance`, `AuditReport`, `DEBIT_PRIORITY`
//! - **Pricing**: `Feature`, `PricingConfig`, `Plan`
//!
//! # Credits
//!
//! A credit entitles an account to one unit of a paid operation (a rank
//! check, a keyword lookup, ...). Amounts are stored as `i64`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod error;
pub mod ids;
pub mod pricing;
pub mod transaction;

pub use balance::{AuditReport, Balance, BucketTotals, DEBIT_PRIORITY};
pub use error::{LedgerError, Result};
pub use ids::{AccountId, IdError, TransactionId};
pub use pricing::{
    Feature, FeaturePricing, Plan, PricingConfig, AGENCY_PLAN_CREDITS, GROWTH_PLAN_CREDITS,
    STARTER_PLAN_CREDITS,
};
pub use transaction::{CreditOptions, CreditType, DebitOptions, Transaction, TransactionType};

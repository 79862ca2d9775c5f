//! Price provider abstractions and implementations.
//!
//! This module contains:
//! - The `PriceProvider` trait that all providers implement
//! - Provider capabilities and per-provider call budgets
//! - Concrete providers (Yahoo, Alpha Vantage, Google Finance, MFAPI)
//!
//! # Architecture
//!
//! Providers are deliberately thin: one HTTP call, one pure function that
//! normalizes the raw response into a [`PriceQuote`](crate::models::PriceQuote).
//! Ordering, circuit breaking and deadlines live in the
//! [`FallbackChain`](crate::registry::FallbackChain).

mod capabilities;
pub(crate) mod http;
mod traits;

pub mod alpha_vantage;
pub mod google_finance;
pub mod mfapi;
pub mod yahoo;

// Re-exports
pub use capabilities::{ProviderBudget, ProviderCapabilities};
pub use traits::PriceProvider;

//! Pricekeeper Core - price cache, staleness policy and background sync.
//!
//! This crate decides whether a fresh price is needed, serves cached prices
//! according to the market state, and keeps the cache warm in the background.
//! It is database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod config;
pub mod constants;
pub mod errors;
pub mod market;
pub mod prices;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{PricingConfig, SchedulerConfig};
pub use market::MarketStatusSource;

// Re-export error types
pub use errors::Error;
pub use errors::Result;

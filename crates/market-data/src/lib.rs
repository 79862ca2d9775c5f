//! Pricekeeper Market Data Crate
//!
//! This crate acquires current prices for personal holdings from unreliable
//! third-party sources and decides whether the home exchange is trading.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Three asset kinds: exchange-listed equities, mutual funds, precious metals
//! - Multiple providers: Yahoo Finance, Alpha Vantage, Google Finance, MFAPI
//! - Per-provider circuit breaking and retry with backoff
//! - Market status detection with an index probe for unscheduled holidays
//!
//! # Architecture
//!
//! ```text
//!                          +------------------+
//!                          |  FallbackChain   |  (priority order, deadlines)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  CircuitBreaker  |  (one per provider)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |  PriceProvider   |  (Yahoo, MFAPI, etc.)
//!                          +------------------+
//!                                  |
//!                                  v
//!                          +------------------+
//!                          |   PriceQuote     |  (normalized price)
//!                          +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`PriceQuote`] - Normalized quote with derived change figures
//! - [`AssetKind`] - Selects the eligible providers
//! - [`FallbackChain`] - Ordered providers, first valid quote wins
//! - [`MarketCalendar`] - Home exchange status with a TTL cache
//! - [`MarketDataError`] - Error taxonomy with retry classification

pub mod calendar;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use calendar::{IndexProbe, MarketCalendar, SessionPhase, TradingHours, YahooIndexProbe};
pub use errors::{retry_with_backoff, Backoff, MarketDataError, RetryClass, RetryPolicy};
pub use models::{
    derive_change, AssetKind, Currency, MarketStatus, MarketStatusReason, PriceQuote, ProviderId,
    HOME_CURRENCY, HOME_TIMEZONE,
};
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::google_finance::GoogleFinanceProvider;
pub use provider::mfapi::MfApiProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{PriceProvider, ProviderBudget, ProviderCapabilities};
pub use registry::{
    ChainLink, CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState, FallbackChain,
    ProviderHealth,
};

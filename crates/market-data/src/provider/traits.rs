//! Price provider trait definitions.
//!
//! This module defines the core `PriceProvider` trait that all price
//! providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{AssetKind, PriceQuote};

use super::capabilities::{ProviderBudget, ProviderCapabilities};

/// Trait for price providers.
///
/// Implement this trait to add support for a new price source. The fallback
/// chain uses the provider's capabilities to decide eligibility and its
/// budget to configure the circuit breaker and call timeout.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use pricekeeper_market_data::provider::{PriceProvider, ProviderBudget, ProviderCapabilities};
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl PriceProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             asset_kinds: &[AssetKind::Equity],
///             intraday: true,
///         }
///     }
///
///     // ... implement fetch_quote
/// }
/// ```
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Should be a constant string like "YAHOO", "MFAPI", etc.
    /// Used for logging, circuit breaker tracking and `PriceQuote::source`.
    fn id(&self) -> &'static str;

    /// Describes which asset kinds this provider can price.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Circuit breaker tuning and per-call timeout.
    fn budget(&self) -> ProviderBudget {
        ProviderBudget::default()
    }

    /// Fetch the latest price for `symbol`.
    ///
    /// Implementations return a quote built with [`PriceQuote::new`] so that
    /// change figures are always derived, and map "unknown symbol" answers to
    /// [`MarketDataError::SymbolNotFound`].
    async fn fetch_quote(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError>;
}

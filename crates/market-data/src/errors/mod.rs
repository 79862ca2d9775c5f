//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for price acquisition
//! - [`RetryClass`]: Classification for determining retry behavior
//! - [`retry_with_backoff`]: The shared retry loop used by every provider adapter

mod retry;

pub use retry::{retry_with_backoff, Backoff, RetryClass, RetryPolicy};

use thiserror::Error;

/// Errors that can occur while acquiring prices.
///
/// Each variant is classified into a [`RetryClass`] via [`retry_class`](Self::retry_class),
/// and into circuit breaker accounting via
/// [`counts_against_circuit`](Self::counts_against_circuit).
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The provider does not know the requested symbol.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider cannot price this kind of asset.
    #[error("Unsupported asset kind: {0}")]
    UnsupportedAssetKind(String),

    /// The provider rate limited the request (HTTP 429 or an in-band notice).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The call exceeded the provider's per-call timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The caller's deadline elapsed before the provider could answer.
    #[error("Deadline exceeded while fetching {symbol}")]
    DeadlineExceeded {
        /// Symbol being fetched when the deadline hit
        symbol: String,
    },

    /// A provider-specific failure (non-2xx, malformed payload, scraping miss).
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned something that cannot be a quote (e.g. `price <= 0`).
    #[error("Invalid quote from {provider}: {message}")]
    InvalidQuote {
        /// The provider that returned the quote
        provider: String,
        /// What was wrong with it
        message: String,
    },

    /// The circuit breaker is open for this provider; it was not called.
    #[error("Circuit open: {provider}")]
    CircuitOpen {
        /// The provider with an open circuit
        provider: String,
    },

    /// The index probe used for market status detection failed.
    #[error("Market status probe failed: {0}")]
    ProbeFailed(String),

    /// No provider in the chain handles this asset kind.
    #[error("No providers available for {0}")]
    NoProvidersAvailable(String),

    /// Every provider in the chain failed or was skipped.
    #[error("All providers exhausted for {symbol} ({attempted} attempted, {skipped} skipped)")]
    AllProvidersExhausted {
        /// Symbol that could not be priced
        symbol: String,
        /// Providers that were called
        attempted: usize,
        /// Providers skipped because their circuit was open
        skipped: usize,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl MarketDataError {
    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricekeeper_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::RateLimited { provider: "YAHOO".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            // Transient errors - retry the same provider with backoff
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::Network(_) => {
                RetryClass::WithBackoff
            }

            // This provider can't answer, another might
            Self::SymbolNotFound(_)
            | Self::UnsupportedAssetKind(_)
            | Self::ProviderError { .. }
            | Self::InvalidQuote { .. } => RetryClass::NextProvider,

            Self::CircuitOpen { .. } => RetryClass::CircuitOpen,

            Self::DeadlineExceeded { .. }
            | Self::ProbeFailed(_)
            | Self::NoProvidersAvailable(_)
            | Self::AllProvidersExhausted { .. } => RetryClass::Never,
        }
    }

    /// Whether this error is a provider failure for circuit breaker accounting.
    ///
    /// A provider that answered "unknown symbol" is healthy, and a call cut
    /// short by the caller's deadline never had a fair chance, so neither is
    /// recorded.
    pub fn counts_against_circuit(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Timeout { .. }
                | Self::ProviderError { .. }
                | Self::InvalidQuote { .. }
                | Self::Network(_)
        )
    }

    /// Whether this error means "no price for this symbol right now".
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::AllProvidersExhausted { .. }
                | Self::NoProvidersAvailable(_)
                | Self::DeadlineExceeded { .. }
        )
    }
}

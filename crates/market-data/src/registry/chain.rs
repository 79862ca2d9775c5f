//! Fallback provider chain.
//!
//! Providers are tried in registration order. Each one is wrapped by its own
//! [`CircuitBreaker`] and bounded by its call timeout; the first valid quote
//! wins and lower-priority providers are never called.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::errors::{MarketDataError, RetryClass};
use crate::models::{AssetKind, PriceQuote};
use crate::provider::alpha_vantage::AlphaVantageProvider;
use crate::provider::google_finance::GoogleFinanceProvider;
use crate::provider::mfapi::MfApiProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::PriceProvider;

use super::circuit_breaker::{CircuitBreaker, CircuitSnapshot};

/// One provider plus the breaker that guards it.
pub struct ChainLink {
    provider: Arc<dyn PriceProvider>,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl ChainLink {
    pub fn new(provider: Arc<dyn PriceProvider>) -> Self {
        let budget = provider.budget();
        let breaker = CircuitBreaker::with_config(Cow::Borrowed(provider.id()), budget.circuit);
        Self {
            provider,
            breaker,
            call_timeout: budget.call_timeout,
        }
    }

    pub fn id(&self) -> &'static str {
        self.provider.id()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn supports(&self, kind: AssetKind) -> bool {
        self.provider.capabilities().supports(kind)
    }
}

/// Health of one provider as reported to operators.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderHealth {
    pub provider_id: String,
    pub asset_kinds: Vec<AssetKind>,
    pub available: bool,
    pub circuit: CircuitSnapshot,
}

/// Ordered list of providers tried per price lookup.
#[derive(Default)]
pub struct FallbackChain {
    links: Vec<ChainLink>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Production chain.
    ///
    /// Equity: YAHOO, ALPHA_VANTAGE (when keyed), GOOGLE_FINANCE.
    /// Metal: YAHOO, GOOGLE_FINANCE. Mutual funds: MFAPI.
    pub fn with_default_providers(alpha_vantage_key: Option<String>) -> Self {
        let mut chain = Self::new().with_provider(Arc::new(YahooProvider::new()));
        if let Some(key) = alpha_vantage_key.filter(|k| !k.trim().is_empty()) {
            chain = chain.with_provider(Arc::new(AlphaVantageProvider::new(key)));
        } else {
            info!("No Alpha Vantage API key configured, provider not registered");
        }
        chain
            .with_provider(Arc::new(GoogleFinanceProvider::new()))
            .with_provider(Arc::new(MfApiProvider::new()))
    }

    /// Append a provider at the lowest priority.
    pub fn with_provider(mut self, provider: Arc<dyn PriceProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn PriceProvider>) {
        debug!(
            "Registering provider '{}' at position {}",
            provider.id(),
            self.links.len()
        );
        self.links.push(ChainLink::new(provider));
    }

    /// Provider ids eligible for `kind`, in priority order.
    pub fn providers_for(&self, kind: AssetKind) -> Vec<&'static str> {
        self.links
            .iter()
            .filter(|link| link.supports(kind))
            .map(ChainLink::id)
            .collect()
    }

    /// Fetch a price, trying providers in order.
    ///
    /// Fails with [`MarketDataError::NoProvidersAvailable`] when no provider
    /// handles `kind`, and [`MarketDataError::AllProvidersExhausted`] when
    /// every eligible provider failed or was skipped.
    pub async fn fetch_price(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError> {
        self.fetch(symbol, kind, None).await
    }

    /// Like [`fetch_price`](Self::fetch_price), bounded by `deadline`.
    ///
    /// Call timeouts are clamped to the remaining budget. Once the deadline
    /// passes the chain stops with [`MarketDataError::DeadlineExceeded`], which
    /// breakers do not count.
    pub async fn fetch_price_until(
        &self,
        symbol: &str,
        kind: AssetKind,
        deadline: Instant,
    ) -> Result<PriceQuote, MarketDataError> {
        self.fetch(symbol, kind, Some(deadline)).await
    }

    async fn fetch(
        &self,
        symbol: &str,
        kind: AssetKind,
        deadline: Option<Instant>,
    ) -> Result<PriceQuote, MarketDataError> {
        let eligible: Vec<&ChainLink> = self.links.iter().filter(|link| link.supports(kind)).collect();
        if eligible.is_empty() {
            warn!("No providers available for asset kind: {}", kind);
            return Err(MarketDataError::NoProvidersAvailable(kind.to_string()));
        }

        let mut attempted = 0;
        let mut skipped = 0;

        for link in eligible {
            let provider_id = link.id();

            let (call_timeout, clamped) = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        debug!("Deadline passed before '{}' for {}", provider_id, symbol);
                        return Err(MarketDataError::DeadlineExceeded {
                            symbol: symbol.to_string(),
                        });
                    }
                    if remaining < link.call_timeout {
                        (remaining, true)
                    } else {
                        (link.call_timeout, false)
                    }
                }
                None => (link.call_timeout, false),
            };

            let provider = &link.provider;
            let result = link
                .breaker
                .execute(|| async move {
                    match tokio::time::timeout(call_timeout, provider.fetch_quote(symbol, kind))
                        .await
                    {
                        Ok(Ok(quote)) => {
                            quote.validate()?;
                            Ok(quote.with_source(Cow::Borrowed(provider_id)))
                        }
                        Ok(Err(e)) => Err(e),
                        Err(_) if clamped => Err(MarketDataError::DeadlineExceeded {
                            symbol: symbol.to_string(),
                        }),
                        Err(_) => Err(MarketDataError::Timeout {
                            provider: provider_id.to_string(),
                        }),
                    }
                })
                .await;

            match result {
                Ok(quote) => {
                    debug!(
                        "Provider '{}' priced {} at {} {}",
                        provider_id, symbol, quote.price, quote.currency
                    );
                    return Ok(quote);
                }
                Err(e) => match e.retry_class() {
                    RetryClass::Never => {
                        info!(
                            "Terminal error from '{}' for {}: {}, stopping",
                            provider_id, symbol, e
                        );
                        return Err(e);
                    }
                    RetryClass::CircuitOpen => {
                        skipped += 1;
                    }
                    RetryClass::WithBackoff | RetryClass::NextProvider => {
                        attempted += 1;
                        warn!(
                            "Provider '{}' failed for {}: {}, trying next provider",
                            provider_id, symbol, e
                        );
                    }
                },
            }
        }

        warn!(
            "All providers exhausted for {} ({} attempted, {} skipped)",
            symbol, attempted, skipped
        );
        Err(MarketDataError::AllProvidersExhausted {
            symbol: symbol.to_string(),
            attempted,
            skipped,
        })
    }

    /// Breaker snapshots for every registered provider.
    pub fn provider_health(&self) -> Vec<ProviderHealth> {
        self.links
            .iter()
            .map(|link| ProviderHealth {
                provider_id: link.id().to_string(),
                asset_kinds: link.provider.capabilities().asset_kinds.to_vec(),
                available: link.breaker.is_available(),
                circuit: link.breaker.snapshot(),
            })
            .collect()
    }

    /// Force a provider's circuit closed. Returns false for unknown ids.
    pub fn reset_circuit(&self, provider_id: &str) -> bool {
        match self
            .links
            .iter()
            .find(|link| link.id().eq_ignore_ascii_case(provider_id))
        {
            Some(link) => {
                link.breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }
}

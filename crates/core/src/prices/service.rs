//! Price service.
//!
//! Answers price lookups from the cache when the staleness policy allows it,
//! otherwise refreshes through the provider fallback chain and writes the
//! result through the cache before returning it.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use pricekeeper_market_data::{
    AssetKind, FallbackChain, MarketDataError, MarketStatus, ProviderHealth,
};

use super::model::{
    CachedPriceEntry, PriceRequest, PriceResult, PriceType, PricedQuote, UnavailableReason,
};
use super::policy::{self, CacheDecision};
use super::store::PriceCacheStore;
use crate::config::PricingConfig;
use crate::errors::{Error, Result, ValidationError};
use crate::market::MarketStatusSource;
use crate::sync::{SymbolPriority, SymbolPriorityStore};

/// Inbound price operations.
#[async_trait]
pub trait PriceServiceTrait: Send + Sync {
    /// Price one symbol. Only input validation fails; a price that cannot be
    /// produced comes back as an unavailable result.
    async fn get_price(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        force_refresh: bool,
    ) -> Result<PriceResult>;

    /// Price many symbols with one market status read. Never fails as a
    /// whole: every requested symbol gets an entry, keyed by the symbol as
    /// it was requested. Blank symbols come back as `INVALID_SYMBOL`.
    async fn get_bulk_prices(
        &self,
        requests: Vec<PriceRequest>,
        force_refresh: bool,
    ) -> HashMap<String, PriceResult>;

    async fn get_market_status(&self) -> MarketStatus;

    /// Drop every cached price. Requires `confirm == true`.
    async fn clear_cache(&self, confirm: bool) -> Result<usize>;

    fn cache_size(&self) -> Result<usize>;

    fn provider_health(&self) -> Vec<ProviderHealth>;

    /// Force a provider's breaker closed.
    fn reset_circuit(&self, provider_id: &str) -> Result<()>;

    /// Register a held symbol so the scheduler keeps it warm.
    async fn register_symbol(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        priority: i32,
    ) -> Result<SymbolPriority>;
}

pub struct PriceService {
    cache: Arc<dyn PriceCacheStore>,
    priorities: Arc<dyn SymbolPriorityStore>,
    chain: Arc<FallbackChain>,
    market: Arc<dyn MarketStatusSource>,
    config: PricingConfig,
    /// One lock per symbol being refreshed on the request path
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl PriceService {
    pub fn new(
        cache: Arc<dyn PriceCacheStore>,
        priorities: Arc<dyn SymbolPriorityStore>,
        chain: Arc<FallbackChain>,
        market: Arc<dyn MarketStatusSource>,
        config: PricingConfig,
    ) -> Self {
        Self {
            cache,
            priorities,
            chain,
            market,
            config,
            inflight: DashMap::new(),
        }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    /// Resolve one symbol against an already known market status.
    ///
    /// `prefetched` carries the cache lookup of a bulk read; `None` means
    /// the cache has not been consulted yet.
    async fn resolve(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        force_refresh: bool,
        status: &MarketStatus,
        prefetched: Option<Option<CachedPriceEntry>>,
    ) -> PriceResult {
        if let Err(e) = self.priorities.record_request(symbol, asset_kind).await {
            warn!("Failed to record request for {}: {}", symbol, e);
        }

        let entry = match prefetched {
            Some(entry) => entry,
            None => self.read_cache(symbol),
        };

        let decision = policy::evaluate(
            entry,
            status,
            Utc::now(),
            cache_duration(&self.config),
            force_refresh,
        );

        match decision {
            CacheDecision::ServeFresh(entry) => {
                debug!("Serving fresh cached price for {}", symbol);
                PriceResult::Priced(PricedQuote::from_entry(
                    &entry,
                    PriceType::Cached,
                    status,
                    true,
                ))
            }
            CacheDecision::ServeClosed(entry) => {
                debug!("Market closed, serving last close for {}", symbol);
                PriceResult::Priced(PricedQuote::from_entry(
                    &entry,
                    PriceType::LastClose,
                    status,
                    true,
                ))
            }
            CacheDecision::Unavailable(reason) => {
                debug!("No price for {}: {:?}", symbol, reason);
                PriceResult::unavailable(symbol, reason).with_market_status(*status)
            }
            CacheDecision::Refresh { stale } => {
                self.refresh(symbol, asset_kind, force_refresh, status, stale)
                    .await
            }
        }
    }

    async fn refresh(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        force_refresh: bool,
        status: &MarketStatus,
        stale: Option<CachedPriceEntry>,
    ) -> PriceResult {
        let lock = self
            .inflight
            .entry(symbol.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;

            // Another request may have refreshed the symbol while we waited.
            match self.read_cache(symbol) {
                Some(entry)
                    if !force_refresh
                        && status.is_open
                        && policy::is_fresh(&entry, Utc::now(), cache_duration(&self.config)) =>
                {
                    debug!("{} refreshed by a concurrent request", symbol);
                    PriceResult::Priced(PricedQuote::from_entry(
                        &entry,
                        PriceType::Cached,
                        status,
                        true,
                    ))
                }
                _ => {
                    self.fetch_and_store(symbol, asset_kind, status, stale)
                        .await
                }
            }
        };

        drop(lock);
        self.inflight
            .remove_if(symbol, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn fetch_and_store(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        status: &MarketStatus,
        stale: Option<CachedPriceEntry>,
    ) -> PriceResult {
        let deadline = tokio::time::Instant::now() + self.config.request_deadline();

        match self
            .chain
            .fetch_price_until(symbol, asset_kind, deadline)
            .await
        {
            Ok(quote) => {
                let source = quote.source.to_string();
                let entry = match self.cache.put(symbol, &quote, &source).await {
                    Ok(entry) => entry,
                    Err(e) => {
                        error!("Failed to cache price for {}: {}", symbol, e);
                        CachedPriceEntry::from_quote(symbol, &quote, &source, Utc::now())
                    }
                };
                let price_type = if status.is_open && quote.is_live_session {
                    PriceType::Live
                } else {
                    PriceType::LastClose
                };
                PriceResult::Priced(PricedQuote::from_entry(
                    &entry,
                    price_type,
                    status,
                    false,
                ))
            }
            Err(e) => {
                let reason = unavailable_reason(&e);
                match stale {
                    Some(entry) => {
                        warn!(
                            "Refresh failed for {} ({}), serving cached price from {}",
                            symbol, e, entry.fetched_at
                        );
                        PriceResult::Priced(PricedQuote::from_entry(
                            &entry,
                            PriceType::Fallback,
                            status,
                            true,
                        ))
                    }
                    None => {
                        warn!("No price available for {}: {}", symbol, e);
                        PriceResult::unavailable(symbol, reason).with_market_status(*status)
                    }
                }
            }
        }
    }

    /// Resolve distinct normalized symbols against one status read and one
    /// bulk cache read.
    async fn resolve_bulk(
        &self,
        order: Vec<String>,
        kinds: &HashMap<String, AssetKind>,
        force_refresh: bool,
    ) -> HashMap<String, PriceResult> {
        let status = self.market.current_status().await;
        let mut cached = match self.cache.get_bulk(&order) {
            Ok(cached) => cached,
            Err(e) => {
                error!("Bulk cache read failed: {}", e);
                HashMap::new()
            }
        };

        debug!(
            "Bulk price request for {} symbols ({} cached, market open: {})",
            order.len(),
            cached.len(),
            status.is_open
        );

        let jobs: Vec<_> = order
            .into_iter()
            .map(|symbol| {
                let kind = kinds.get(&symbol).copied().unwrap_or_default();
                let entry = cached.remove(&symbol);
                (symbol, kind, entry)
            })
            .collect();

        let status = &status;
        stream::iter(jobs)
            .map(|(symbol, kind, entry)| async move {
                let result = self
                    .resolve(&symbol, kind, force_refresh, status, Some(entry))
                    .await;
                (symbol, result)
            })
            .buffer_unordered(self.config.bulk_concurrency.max(1))
            .collect::<HashMap<_, _>>()
            .await
    }

    fn read_cache(&self, symbol: &str) -> Option<CachedPriceEntry> {
        match self.cache.get(symbol) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to read cached price for {}: {}", symbol, e);
                None
            }
        }
    }
}

#[async_trait]
impl PriceServiceTrait for PriceService {
    async fn get_price(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        force_refresh: bool,
    ) -> Result<PriceResult> {
        let symbol = normalize_symbol(symbol)?;
        let status = self.market.current_status().await;
        Ok(self
            .resolve(&symbol, asset_kind, force_refresh, &status, None)
            .await)
    }

    async fn get_bulk_prices(
        &self,
        requests: Vec<PriceRequest>,
        force_refresh: bool,
    ) -> HashMap<String, PriceResult> {
        let mut kinds: HashMap<String, AssetKind> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        // Requested key and its normalized symbol, `None` when blank.
        let mut requested: Vec<(String, Option<String>)> = Vec::with_capacity(requests.len());
        for request in requests {
            match normalize_symbol(&request.symbol) {
                Ok(symbol) => {
                    if !kinds.contains_key(&symbol) {
                        kinds.insert(symbol.clone(), request.asset_kind);
                        order.push(symbol.clone());
                    }
                    requested.push((request.symbol, Some(symbol)));
                }
                Err(_) => {
                    warn!("Blank symbol in bulk request");
                    requested.push((request.symbol, None));
                }
            }
        }

        let resolved = if order.is_empty() {
            HashMap::new()
        } else {
            self.resolve_bulk(order, &kinds, force_refresh).await
        };

        requested
            .into_iter()
            .map(|(key, symbol)| {
                let result = match symbol {
                    Some(symbol) => match resolved.get(&symbol) {
                        Some(result) => result.clone(),
                        None => PriceResult::unavailable(symbol, UnavailableReason::InternalError),
                    },
                    None => PriceResult::unavailable(key.clone(), UnavailableReason::InvalidSymbol),
                };
                (key, result)
            })
            .collect()
    }

    async fn get_market_status(&self) -> MarketStatus {
        self.market.current_status().await
    }

    async fn clear_cache(&self, confirm: bool) -> Result<usize> {
        if !confirm {
            return Err(Error::Validation(ValidationError::InvalidInput(
                "Clearing the price cache requires confirm=true".to_string(),
            )));
        }
        let removed = self.cache.clear().await?;
        info!("Cleared {} cached prices", removed);
        Ok(removed)
    }

    fn cache_size(&self) -> Result<usize> {
        self.cache.count()
    }

    fn provider_health(&self) -> Vec<ProviderHealth> {
        self.chain.provider_health()
    }

    fn reset_circuit(&self, provider_id: &str) -> Result<()> {
        if self.chain.reset_circuit(provider_id) {
            info!("Circuit for provider '{}' reset by operator", provider_id);
            Ok(())
        } else {
            Err(Error::NotFound(format!("Unknown provider: {}", provider_id)))
        }
    }

    async fn register_symbol(
        &self,
        symbol: &str,
        asset_kind: AssetKind,
        priority: i32,
    ) -> Result<SymbolPriority> {
        let symbol = normalize_symbol(symbol)?;
        self.priorities
            .register_symbol(&symbol, asset_kind, priority)
            .await
    }
}

/// Trim and upper-case a symbol; blank symbols are rejected.
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(Error::Validation(ValidationError::MissingField(
            "symbol".to_string(),
        )));
    }
    Ok(symbol.to_uppercase())
}

fn unavailable_reason(error: &MarketDataError) -> UnavailableReason {
    match error {
        MarketDataError::DeadlineExceeded { .. } => UnavailableReason::Timeout,
        MarketDataError::NoProvidersAvailable(_) => UnavailableReason::NoProviders,
        _ => UnavailableReason::AllProvidersExhausted,
    }
}

fn cache_duration(config: &PricingConfig) -> chrono::Duration {
    chrono::Duration::from_std(config.cache_duration())
        .unwrap_or_else(|_| chrono::Duration::days(365))
}

//! Price cache storage trait.
//!
//! Reads are synchronous (pooled connections), writes are async because they
//! go through the storage layer's single writer.

use async_trait::async_trait;
use pricekeeper_market_data::PriceQuote;
use std::collections::HashMap;

use super::model::CachedPriceEntry;
use crate::errors::Result;

/// Storage interface for the last known price per symbol.
///
/// # Method Naming Convention
///
/// - `get*` - Read cached entries
/// - `put` - Upsert, last write wins
/// - `clear` - Remove everything (explicit operator action only)
#[async_trait]
pub trait PriceCacheStore: Send + Sync {
    /// Cached entry for `symbol`, if any.
    fn get(&self, symbol: &str) -> Result<Option<CachedPriceEntry>>;

    /// Cached entries for many symbols at once. Missing symbols are absent
    /// from the map.
    fn get_bulk(&self, symbols: &[String]) -> Result<HashMap<String, CachedPriceEntry>>;

    /// Upsert the entry for `symbol` from `quote`, stamping `fetched_at = now`.
    async fn put(&self, symbol: &str, quote: &PriceQuote, source: &str)
        -> Result<CachedPriceEntry>;

    /// Delete every entry, returning how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Number of cached symbols.
    fn count(&self) -> Result<usize>;
}

//! Staleness policy for cached prices.
//!
//! Pure functions: given the cache entry, the market status and the clock,
//! decide whether to serve, refresh or give up.

use chrono::{DateTime, Duration, Utc};
use pricekeeper_market_data::MarketStatus;

use super::model::{CachedPriceEntry, UnavailableReason};

/// What the price service should do with a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// Market open and the entry is younger than the cache duration.
    ServeFresh(CachedPriceEntry),
    /// Market closed; serve the entry with zero reported change.
    ServeClosed(CachedPriceEntry),
    /// Ask the provider chain. `stale` is served if that fails.
    Refresh { stale: Option<CachedPriceEntry> },
    /// Nothing to serve and nothing worth fetching.
    Unavailable(UnavailableReason),
}

/// Whether `entry` is still fresh at `now`.
pub fn is_fresh(entry: &CachedPriceEntry, now: DateTime<Utc>, cache_duration: Duration) -> bool {
    now - entry.fetched_at < cache_duration
}

/// Decide how to answer a lookup.
pub fn evaluate(
    entry: Option<CachedPriceEntry>,
    status: &MarketStatus,
    now: DateTime<Utc>,
    cache_duration: Duration,
    force_refresh: bool,
) -> CacheDecision {
    if force_refresh {
        return CacheDecision::Refresh { stale: entry };
    }

    match (status.is_open, entry) {
        (true, Some(entry)) if is_fresh(&entry, now, cache_duration) => {
            CacheDecision::ServeFresh(entry)
        }
        (true, stale) => CacheDecision::Refresh { stale },
        (false, Some(entry)) => CacheDecision::ServeClosed(entry),
        (false, None) => CacheDecision::Unavailable(UnavailableReason::MarketClosedNoCache),
    }
}

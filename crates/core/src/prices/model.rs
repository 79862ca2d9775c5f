//! Domain models for cached prices and price responses.

use chrono::{DateTime, NaiveDate, Utc};
use pricekeeper_market_data::{AssetKind, MarketStatus, PriceQuote};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest successful quote for a symbol, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPriceEntry {
    pub symbol: String,
    pub price: Decimal,
    pub previous_close: Option<Decimal>,
    pub change_amount: Decimal,
    pub change_percent: Decimal,
    pub currency: String,
    pub price_date: NaiveDate,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl CachedPriceEntry {
    /// Project a quote into a cache row stamped with `fetched_at`.
    pub fn from_quote(
        symbol: &str,
        quote: &PriceQuote,
        source: &str,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: quote.price,
            previous_close: quote.previous_close,
            change_amount: quote.change,
            change_percent: quote.change_percent,
            currency: quote.currency.clone(),
            price_date: quote.trading_date,
            source: source.to_string(),
            fetched_at,
        }
    }
}

/// How the reported price was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceType {
    /// Fetched just now during a live session.
    Live,
    /// Served from a cache entry that is still fresh.
    Cached,
    /// Last close of a session that has ended; change is reported as zero.
    LastClose,
    /// Refresh failed, the stale cache entry is served instead.
    Fallback,
}

/// Why no price could be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnavailableReason {
    MarketClosedNoCache,
    AllProvidersExhausted,
    NoProviders,
    Timeout,
    InternalError,
    /// The requested symbol was blank.
    InvalidSymbol,
}

/// A price that could be served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedQuote {
    pub symbol: String,
    pub price: Decimal,
    pub previous_close: Option<Decimal>,
    /// Change reported to the client; zero while the market is closed.
    pub change: Decimal,
    pub change_percent: Decimal,
    /// Change of the session the price belongs to, as stored.
    pub last_change: Decimal,
    pub last_change_percent: Decimal,
    pub currency: String,
    pub price_date: NaiveDate,
    pub source: String,
    pub price_type: PriceType,
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
    /// Status the serving decision was made against.
    pub market_status: MarketStatus,
}

impl PricedQuote {
    /// Build a response from a cache entry.
    ///
    /// While the market is closed the reported change is forced to zero.
    /// `cached` tells the client the entry was not fetched by this request.
    pub fn from_entry(
        entry: &CachedPriceEntry,
        price_type: PriceType,
        status: &MarketStatus,
        cached: bool,
    ) -> Self {
        let (change, change_percent) = if status.is_open {
            (entry.change_amount, entry.change_percent)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };
        Self {
            symbol: entry.symbol.clone(),
            price: entry.price,
            previous_close: entry.previous_close,
            change,
            change_percent,
            last_change: entry.change_amount,
            last_change_percent: entry.change_percent,
            currency: entry.currency.clone(),
            price_date: entry.price_date,
            source: entry.source.clone(),
            price_type,
            cached,
            fetched_at: entry.fetched_at,
            market_status: *status,
        }
    }
}

/// Unavailable marker; serializes as `{symbol, price: null, unavailable: true, reason}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailablePrice {
    pub symbol: String,
    pub price: Option<Decimal>,
    pub unavailable: bool,
    pub reason: UnavailableReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_status: Option<MarketStatus>,
}

/// Outcome of a price lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PriceResult {
    Priced(PricedQuote),
    Unavailable(UnavailablePrice),
}

impl PriceResult {
    pub fn unavailable(symbol: impl Into<String>, reason: UnavailableReason) -> Self {
        PriceResult::Unavailable(UnavailablePrice {
            symbol: symbol.into(),
            price: None,
            unavailable: true,
            reason,
            market_status: None,
        })
    }

    /// Attach the market status the result was decided against.
    pub fn with_market_status(mut self, status: MarketStatus) -> Self {
        match &mut self {
            PriceResult::Priced(p) => p.market_status = status,
            PriceResult::Unavailable(u) => u.market_status = Some(status),
        }
        self
    }

    pub fn market_status(&self) -> Option<&MarketStatus> {
        match self {
            PriceResult::Priced(p) => Some(&p.market_status),
            PriceResult::Unavailable(u) => u.market_status.as_ref(),
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            PriceResult::Priced(p) => &p.symbol,
            PriceResult::Unavailable(u) => &u.symbol,
        }
    }

    pub fn price(&self) -> Option<Decimal> {
        match self {
            PriceResult::Priced(p) => Some(p.price),
            PriceResult::Unavailable(_) => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, PriceResult::Unavailable(_))
    }

    pub fn as_priced(&self) -> Option<&PricedQuote> {
        match self {
            PriceResult::Priced(p) => Some(p),
            PriceResult::Unavailable(_) => None,
        }
    }
}

/// One entry of a bulk price request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub symbol: String,
    #[serde(default)]
    pub asset_kind: AssetKind,
}

impl PriceRequest {
    pub fn new(symbol: impl Into<String>, asset_kind: AssetKind) -> Self {
        Self {
            symbol: symbol.into(),
            asset_kind,
        }
    }
}

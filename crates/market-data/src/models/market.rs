use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why the market is (or is not) considered open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatusReason {
    Weekend,
    PreMarket,
    AfterHours,
    /// Inside the trading window, but the reference index is not trading.
    Holiday,
    Open,
    Unknown,
}

/// Derived trading status of the home exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatus {
    pub is_open: bool,
    pub reason: MarketStatusReason,
    pub as_of: DateTime<Utc>,
}

impl MarketStatus {
    pub fn open(as_of: DateTime<Utc>) -> Self {
        Self {
            is_open: true,
            reason: MarketStatusReason::Open,
            as_of,
        }
    }

    pub fn closed(reason: MarketStatusReason, as_of: DateTime<Utc>) -> Self {
        Self {
            is_open: false,
            reason,
            as_of,
        }
    }
}

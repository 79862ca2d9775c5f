use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use yahoo_finance_api as yahoo;

use crate::errors::MarketDataError;

/// Source of the reference index's last trade time.
#[async_trait]
pub trait IndexProbe: Send + Sync {
    async fn last_trade_time(&self, symbol: &str) -> Result<DateTime<Utc>, MarketDataError>;
}

/// Probe backed by the Yahoo Finance connector.
pub struct YahooIndexProbe {
    connector: yahoo::YahooConnector,
    timeout: Duration,
}

impl YahooIndexProbe {
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let connector = yahoo::YahooConnector::new().map_err(|e| {
            MarketDataError::ProbeFailed(format!("Failed to initialize Yahoo connector: {}", e))
        })?;
        Ok(Self { connector, timeout })
    }
}

#[async_trait]
impl IndexProbe for YahooIndexProbe {
    async fn last_trade_time(&self, symbol: &str) -> Result<DateTime<Utc>, MarketDataError> {
        let response = tokio::time::timeout(
            self.timeout,
            self.connector.get_latest_quotes(symbol, "1m"),
        )
        .await
        .map_err(|_| MarketDataError::ProbeFailed(format!("{} probe timed out", symbol)))?
        .map_err(|e| MarketDataError::ProbeFailed(e.to_string()))?;

        let quote = response
            .last_quote()
            .map_err(|e| MarketDataError::ProbeFailed(e.to_string()))?;

        let traded_at = Utc
            .timestamp_opt(quote.timestamp as i64, 0)
            .single()
            .ok_or_else(|| {
                MarketDataError::ProbeFailed(format!("Invalid timestamp: {}", quote.timestamp))
            })?;
        debug!("Index {} last traded at {}", symbol, traded_at);
        Ok(traded_at)
    }
}

//! Yahoo Finance price provider.
//!
//! Primary source for exchange-listed equities (e.g. `RELIANCE.NS`,
//! `500325.BO`) and precious metal futures (`GC=F`, `SI=F`), read from the
//! public v8 chart endpoint.

mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::errors::{retry_with_backoff, MarketDataError, RetryPolicy};
use crate::models::{AssetKind, PriceQuote, HOME_CURRENCY, HOME_TIMEZONE};
use crate::provider::http::{build_client, get_text, parse_json};
use crate::provider::{PriceProvider, ProviderBudget, ProviderCapabilities};

use models::{YahooChartMeta, YahooChartResponse};

const PROVIDER_ID: &str = "YAHOO";
const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the provider at another host (mirrors, test servers).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: build_client(Duration::from_secs(8)),
            base_url: base_url.into(),
            retry: RetryPolicy::default(),
        }
    }

    fn chart_url(&self, symbol: &str) -> String {
        format!(
            "{}/{}?interval=1d&range=1d",
            self.base_url.trim_end_matches('/'),
            encode(symbol)
        )
    }

    async fn fetch_chart(&self, symbol: &str) -> Result<YahooChartResponse, MarketDataError> {
        let url = self.chart_url(symbol);
        // Yahoo answers unknown symbols with a 404 carrying a JSON error body,
        // which get_text already maps to SymbolNotFound.
        let body = get_text(&self.client, PROVIDER_ID, symbol, &url).await?;
        parse_json(PROVIDER_ID, &body)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a chart response into a [`PriceQuote`].
///
/// `now` decides whether the quote belongs to the current session, using the
/// exchange offset Yahoo reports.
pub(crate) fn chart_to_quote(
    symbol: &str,
    response: YahooChartResponse,
    now: DateTime<Utc>,
) -> Result<PriceQuote, MarketDataError> {
    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }
        return Err(MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!(
                "{}: {}",
                error.code,
                error.description.unwrap_or_default()
            ),
        });
    }

    let meta: YahooChartMeta = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| MarketDataError::SymbolNotFound(symbol.to_string()))?;

    let price = meta
        .regular_market_price
        .and_then(Decimal::from_f64_retain)
        .ok_or_else(|| MarketDataError::InvalidQuote {
            provider: PROVIDER_ID.to_string(),
            message: format!("No regular market price for {}", symbol),
        })?;

    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .and_then(Decimal::from_f64_retain);

    let offset = meta
        .gmt_offset
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| now.with_timezone(&HOME_TIMEZONE).offset().fix());
    let today = now.with_timezone(&offset).date_naive();
    let trading_date = meta
        .regular_market_time
        .and_then(|ts| offset.timestamp_opt(ts, 0).single())
        .map(|dt| dt.date_naive())
        .unwrap_or(today);

    let currency = meta
        .currency
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| HOME_CURRENCY.to_string());

    Ok(PriceQuote::new(
        symbol,
        price,
        previous_close,
        currency,
        trading_date,
        trading_date == today,
        PROVIDER_ID.into(),
    ))
}

#[async_trait]
impl PriceProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: &[AssetKind::Equity, AssetKind::Metal],
            intraday: true,
        }
    }

    fn budget(&self) -> ProviderBudget {
        ProviderBudget::new(3, Duration::from_secs(5 * 60), Duration::from_secs(10))
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError> {
        if !self.capabilities().supports(kind) {
            return Err(MarketDataError::UnsupportedAssetKind(kind.to_string()));
        }

        let response =
            retry_with_backoff(&self.retry, PROVIDER_ID, || self.fetch_chart(symbol)).await?;

        let quote = chart_to_quote(symbol, response, Utc::now()).map_err(|e| {
            warn!("Yahoo chart for {} could not be normalized: {}", symbol, e);
            e
        })?;
        debug!(
            "Yahoo quote for {}: {} {} ({})",
            symbol, quote.price, quote.currency, quote.trading_date
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn parse(body: &str) -> YahooChartResponse {
        serde_json::from_str(body).unwrap()
    }

    const RELIANCE_CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "currency": "INR",
                    "symbol": "RELIANCE.NS",
                    "exchangeName": "NSI",
                    "regularMarketPrice": 2950.5,
                    "chartPreviousClose": 2900.0,
                    "previousClose": 2910.0,
                    "regularMarketTime": 1760608800,
                    "gmtoffset": 19800,
                    "timezone": "IST"
                },
                "timestamp": [1760608800],
                "indicators": {"quote": [{}]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_chart_to_quote_live_session() {
        // 2025-10-16 10:00 UTC == 15:30 IST, same session as regularMarketTime
        let now = Utc.with_ymd_and_hms(2025, 10, 16, 10, 0, 0).unwrap();
        let quote = chart_to_quote("RELIANCE.NS", parse(RELIANCE_CHART), now).unwrap();

        assert_eq!(quote.price, dec!(2950.5));
        assert_eq!(quote.previous_close, Some(dec!(2910)));
        assert_eq!(quote.change, dec!(40.5));
        assert_eq!(quote.currency, "INR");
        assert_eq!(
            quote.trading_date,
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
        );
        assert!(quote.is_live_session);
        assert_eq!(quote.source, "YAHOO");
    }

    #[test]
    fn test_chart_to_quote_previous_session_is_not_live() {
        let now = Utc.with_ymd_and_hms(2025, 10, 18, 6, 0, 0).unwrap();
        let quote = chart_to_quote("RELIANCE.NS", parse(RELIANCE_CHART), now).unwrap();
        assert!(!quote.is_live_session);
    }

    #[test]
    fn test_chart_previous_close_fallback() {
        let body = r#"{"chart":{"result":[{"meta":{"currency":"USD","regularMarketPrice":2400.1,
            "chartPreviousClose":2390.0,"regularMarketTime":1760608800,"gmtoffset":-14400}}],"error":null}}"#;
        let now = Utc.with_ymd_and_hms(2025, 10, 16, 12, 0, 0).unwrap();
        let quote = chart_to_quote("GC=F", parse(body), now).unwrap();
        assert_eq!(quote.previous_close, Some(dec!(2390)));
        assert_eq!(quote.currency, "USD");
    }

    #[test]
    fn test_chart_error_not_found() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let result = chart_to_quote("NOPE.NS", parse(body), Utc::now());
        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(s)) if s == "NOPE.NS"));
    }

    #[test]
    fn test_chart_without_price_is_invalid() {
        let body = r#"{"chart":{"result":[{"meta":{"currency":"INR"}}],"error":null}}"#;
        let result = chart_to_quote("TCS.NS", parse(body), Utc::now());
        assert!(matches!(result, Err(MarketDataError::InvalidQuote { .. })));
    }

    #[test]
    fn test_provider_budget() {
        let provider = YahooProvider::new();
        let budget = provider.budget();
        assert_eq!(provider.id(), "YAHOO");
        assert_eq!(budget.circuit.failure_threshold, 3);
        assert_eq!(budget.circuit.recovery_timeout, Duration::from_secs(300));
        assert_eq!(budget.call_timeout, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_mutual_funds_are_unsupported() {
        let provider = YahooProvider::new();
        let result = provider.fetch_quote("119551", AssetKind::MutualFund).await;
        assert!(matches!(result, Err(MarketDataError::UnsupportedAssetKind(_))));
    }
}

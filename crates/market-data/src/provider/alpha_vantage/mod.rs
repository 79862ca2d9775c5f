//! Alpha Vantage price provider implementation.
//!
//! Secondary equity source using the `GLOBAL_QUOTE` endpoint. Indian listings
//! are only available under the BSE suffix, so `.NS` and `.BO` tickers are
//! rewritten to `.BSE` before the call.
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute and
//! 25 per day, so the provider is only registered when a key is configured.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::{retry_with_backoff, MarketDataError, RetryPolicy};
use crate::models::{AssetKind, PriceQuote, HOME_TIMEZONE};
use crate::provider::http::{build_client, map_request_error, parse_json, status_error};
use crate::provider::{PriceProvider, ProviderBudget, ProviderCapabilities};

const BASE_URL: &str = "https://www.alphavantage.co/query";
const PROVIDER_ID: &str = "ALPHA_VANTAGE";

/// Alpha Vantage price provider.
pub struct AlphaVantageProvider {
    client: Client,
    api_key: String,
    retry: RetryPolicy,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// All values arrive as strings; an unknown symbol yields an empty object.
#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "01. symbol")]
    symbol: Option<String>,
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
    #[serde(rename = "08. previous close")]
    previous_close: Option<String>,
}

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self {
            client: build_client(Duration::from_secs(12)),
            api_key,
            retry: RetryPolicy::default(),
        }
    }

    /// Map an exchange-qualified ticker to Alpha Vantage's naming.
    ///
    /// `RELIANCE.NS` and `RELIANCE.BO` both become `RELIANCE.BSE`.
    pub fn map_symbol(symbol: &str) -> String {
        let upper = symbol.trim().to_ascii_uppercase();
        match upper.rsplit_once('.') {
            Some((base, "NS" | "BO")) => format!("{}.BSE", base),
            _ => upper,
        }
    }

    fn currency_for(mapped_symbol: &str) -> &'static str {
        if mapped_symbol.ends_with(".BSE") {
            "INR"
        } else {
            "USD"
        }
    }

    /// Make a request to the Alpha Vantage API.
    async fn fetch(&self, symbol: &str) -> Result<String, MarketDataError> {
        let params = [
            ("function", "GLOBAL_QUOTE"),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];

        let url = reqwest::Url::parse_with_params(BASE_URL, &params).map_err(|e| {
            MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: format!("Failed to build URL: {}", e),
            }
        })?;

        debug!(
            "Alpha Vantage request: {}",
            url.as_str().replace(&self.api_key, "***")
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_request_error(PROVIDER_ID, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(PROVIDER_ID, symbol, status));
        }

        response
            .text()
            .await
            .map_err(|e| map_request_error(PROVIDER_ID, e))
    }

    /// Check for API-level errors in the response.
    ///
    /// Alpha Vantage answers rate limiting with HTTP 200 and a `Note` or
    /// `Information` message.
    fn check_api_error(response: &GlobalQuoteResponse, symbol: &str) -> Result<(), MarketDataError> {
        if let Some(ref msg) = response.error_message {
            if msg.contains("Invalid API call") || msg.contains("not found") {
                return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
            }
            return Err(MarketDataError::ProviderError {
                provider: PROVIDER_ID.to_string(),
                message: msg.clone(),
            });
        }

        for msg in [&response.note, &response.information].into_iter().flatten() {
            if msg.contains("API call frequency")
                || msg.contains("rate limit")
                || msg.contains("requests per day")
            {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                });
            }
            warn!("Alpha Vantage notice: {}", msg);
        }

        Ok(())
    }

    /// Parse a date string in YYYY-MM-DD format.
    fn parse_date(date_str: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()
    }

    /// Parse a decimal value from a string.
    fn parse_decimal(s: &str) -> Option<Decimal> {
        Decimal::from_str(s.trim()).ok()
    }

    /// Normalize a GLOBAL_QUOTE body into a [`PriceQuote`].
    ///
    /// `symbol` is the caller's symbol; the quote keeps it rather than the
    /// BSE-mapped one so cache keys stay stable.
    fn global_quote_to_quote(
        symbol: &str,
        mapped_symbol: &str,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote, MarketDataError> {
        let response: GlobalQuoteResponse = parse_json(PROVIDER_ID, body)?;
        Self::check_api_error(&response, symbol)?;

        let quote = response.global_quote.unwrap_or_default();
        if quote.symbol.is_none() && quote.price.is_none() {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let price = quote
            .price
            .as_deref()
            .and_then(Self::parse_decimal)
            .ok_or_else(|| MarketDataError::InvalidQuote {
                provider: PROVIDER_ID.to_string(),
                message: format!("Unparseable price for {}", mapped_symbol),
            })?;
        let previous_close = quote.previous_close.as_deref().and_then(Self::parse_decimal);

        let today = now.with_timezone(&HOME_TIMEZONE).date_naive();
        let trading_date = quote
            .latest_trading_day
            .as_deref()
            .and_then(Self::parse_date)
            .unwrap_or(today);

        Ok(PriceQuote::new(
            symbol,
            price,
            previous_close,
            Self::currency_for(mapped_symbol),
            trading_date,
            trading_date == today,
            PROVIDER_ID.into(),
        ))
    }
}

#[async_trait]
impl PriceProvider for AlphaVantageProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: &[AssetKind::Equity],
            intraday: true,
        }
    }

    fn budget(&self) -> ProviderBudget {
        ProviderBudget::new(5, Duration::from_secs(2 * 60), Duration::from_secs(15))
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError> {
        if !self.capabilities().supports(kind) {
            return Err(MarketDataError::UnsupportedAssetKind(kind.to_string()));
        }

        let mapped = Self::map_symbol(symbol);
        let body = retry_with_backoff(&self.retry, PROVIDER_ID, || self.fetch(&mapped)).await?;
        Self::global_quote_to_quote(symbol, &mapped, &body, Utc::now())
    }
}

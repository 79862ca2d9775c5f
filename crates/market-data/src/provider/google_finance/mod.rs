//! Google Finance price provider.
//!
//! Last-resort source that scrapes the public quote page. The page has no
//! stable API, so anything that does not match the expected markup is a
//! provider failure and counts against the circuit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::Client;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;

use crate::calendar::TradingHours;
use crate::errors::{retry_with_backoff, MarketDataError, RetryPolicy};
use crate::models::{AssetKind, PriceQuote, HOME_CURRENCY};
use crate::provider::http::{build_client, get_text};
use crate::provider::{PriceProvider, ProviderBudget, ProviderCapabilities};

const PROVIDER_ID: &str = "GOOGLE_FINANCE";
const BASE_URL: &str = "https://www.google.com/finance/quote";

const PRICE_SELECTOR: &str = "div.YMlKec.fxKbKc";
const STAT_ROW_SELECTOR: &str = "div.gyFHrc";
const STAT_VALUE_SELECTOR: &str = "div.P6K39c";

/// Google Finance scraping provider.
pub struct GoogleFinanceProvider {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl GoogleFinanceProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(Duration::from_secs(12)),
            base_url: BASE_URL.to_string(),
            // One attempt: the page is heavy and the chain has better options.
            retry: RetryPolicy::none(),
        }
    }

    /// Map a Yahoo-style symbol to Google's `TICKER:EXCHANGE` form.
    pub fn map_symbol(symbol: &str) -> String {
        let upper = symbol.trim().to_ascii_uppercase();
        match upper.as_str() {
            "GC=F" => return "GCW00:COMEX".to_string(),
            "SI=F" => return "SIW00:COMEX".to_string(),
            _ => {}
        }
        if upper.contains(':') {
            return upper;
        }
        match upper.rsplit_once('.') {
            Some((base, "NS")) => format!("{}:NSE", base),
            Some((base, "BO")) => format!("{}:BOM", base),
            _ => format!("{}:NSE", upper),
        }
    }

    fn quote_url(&self, ticker: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), ticker)
    }
}

impl Default for GoogleFinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn selector(css: &str) -> Result<Selector, MarketDataError> {
    Selector::parse(css).map_err(|e| MarketDataError::ProviderError {
        provider: PROVIDER_ID.to_string(),
        message: format!("Invalid selector {}: {}", css, e),
    })
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Split a displayed amount such as `₹2,950.50` into currency and value.
fn parse_amount(text: &str) -> Option<(&'static str, Decimal)> {
    let text = text.trim();
    let currency = match text.chars().next()? {
        '₹' => "INR",
        '$' => "USD",
        '€' => "EUR",
        '£' => "GBP",
        _ => HOME_CURRENCY,
    };
    let digits: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    Decimal::from_str(&digits).ok().map(|value| (currency, value))
}

/// Extract a quote from a Google Finance quote page.
pub(crate) fn page_to_quote(
    symbol: &str,
    html: &str,
    now: DateTime<Utc>,
) -> Result<PriceQuote, MarketDataError> {
    let document = Html::parse_document(html);

    let price_text = document
        .select(&selector(PRICE_SELECTOR)?)
        .next()
        .map(element_text)
        .ok_or_else(|| MarketDataError::ProviderError {
            provider: PROVIDER_ID.to_string(),
            message: format!("No price element on quote page for {}", symbol),
        })?;

    let (currency, price) =
        parse_amount(&price_text).ok_or_else(|| MarketDataError::InvalidQuote {
            provider: PROVIDER_ID.to_string(),
            message: format!("Unparseable price '{}' for {}", price_text, symbol),
        })?;

    let value_selector = selector(STAT_VALUE_SELECTOR)?;
    let previous_close = document
        .select(&selector(STAT_ROW_SELECTOR)?)
        .find(|row| element_text(*row).contains("Previous close"))
        .and_then(|row| row.select(&value_selector).next())
        .map(element_text)
        .and_then(|text| parse_amount(&text))
        .map(|(_, value)| value);

    // The page carries no session date; it always shows the latest session.
    let hours = TradingHours::default();
    let session_date = hours.latest_session_date(now);
    let live = hours.is_trading_window(now);

    Ok(PriceQuote::new(
        symbol,
        price,
        previous_close,
        currency,
        session_date,
        live,
        PROVIDER_ID.into(),
    ))
}

#[async_trait]
impl PriceProvider for GoogleFinanceProvider {
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
        ProviderBudget::new(10, Duration::from_secs(10 * 60), Duration::from_secs(15))
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError> {
        if !self.capabilities().supports(kind) {
            return Err(MarketDataError::UnsupportedAssetKind(kind.to_string()));
        }

        let ticker = Self::map_symbol(symbol);
        let url = self.quote_url(&ticker);
        debug!("Google Finance lookup {} -> {}", symbol, ticker);

        let html = retry_with_backoff(&self.retry, PROVIDER_ID, || {
            get_text(&self.client, PROVIDER_ID, symbol, &url)
        })
        .await?;

        page_to_quote(symbol, &html, Utc::now()).map_err(|e| {
            warn!("Google Finance page for {} not usable: {}", ticker, e);
            e
        })
    }
}

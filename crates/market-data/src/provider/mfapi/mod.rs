//! MFAPI mutual fund NAV provider.
//!
//! Serves end-of-day NAVs for Indian mutual fund schemes keyed by AMFI scheme
//! code. NAVs are published once per business day, so quotes from this
//! provider are never part of a live session.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::debug;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::errors::{retry_with_backoff, MarketDataError, RetryPolicy};
use crate::models::{AssetKind, PriceQuote, HOME_CURRENCY};
use crate::provider::http::{build_client, get_text, parse_json};
use crate::provider::{PriceProvider, ProviderBudget, ProviderCapabilities};

const PROVIDER_ID: &str = "MFAPI";
const BASE_URL: &str = "https://api.mfapi.in/mf";

#[derive(Debug, Deserialize)]
struct SchemeResponse {
    #[serde(default)]
    meta: Option<SchemeMeta>,
    #[serde(default)]
    data: Vec<NavPoint>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SchemeMeta {
    scheme_name: Option<String>,
}

/// One NAV observation, newest first in the response.
#[derive(Debug, Deserialize)]
struct NavPoint {
    /// `dd-mm-yyyy`
    date: String,
    nav: String,
}

/// MFAPI price provider.
pub struct MfApiProvider {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl MfApiProvider {
    pub fn new() -> Self {
        Self {
            client: build_client(Duration::from_secs(8)),
            base_url: BASE_URL.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    fn parse_date(date: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(date.trim(), "%d-%m-%Y").ok()
    }

    fn parse_nav(nav: &str) -> Option<Decimal> {
        Decimal::from_str(nav.trim()).ok()
    }

    /// Normalize a scheme history body into a [`PriceQuote`].
    fn scheme_to_quote(scheme_code: &str, body: &str) -> Result<PriceQuote, MarketDataError> {
        let response: SchemeResponse = parse_json(PROVIDER_ID, body)?;

        if let Some(status) = response.status.as_deref() {
            if !status.eq_ignore_ascii_case("SUCCESS") {
                return Err(MarketDataError::ProviderError {
                    provider: PROVIDER_ID.to_string(),
                    message: format!("Status {} for scheme {}", status, scheme_code),
                });
            }
        }

        let mut points = response.data.iter();
        let latest = points
            .next()
            .ok_or_else(|| MarketDataError::SymbolNotFound(scheme_code.to_string()))?;

        let nav = Self::parse_nav(&latest.nav).ok_or_else(|| MarketDataError::InvalidQuote {
            provider: PROVIDER_ID.to_string(),
            message: format!("Unparseable NAV '{}' for {}", latest.nav, scheme_code),
        })?;
        let trading_date =
            Self::parse_date(&latest.date).ok_or_else(|| MarketDataError::InvalidQuote {
                provider: PROVIDER_ID.to_string(),
                message: format!("Unparseable NAV date '{}' for {}", latest.date, scheme_code),
            })?;
        let previous_nav = points.next().and_then(|p| Self::parse_nav(&p.nav));

        if let Some(name) = response.meta.and_then(|m| m.scheme_name) {
            debug!("MFAPI {} ({}) NAV {} on {}", scheme_code, name, nav, trading_date);
        }

        Ok(PriceQuote::new(
            scheme_code,
            nav,
            previous_nav,
            HOME_CURRENCY,
            trading_date,
            false,
            PROVIDER_ID.into(),
        ))
    }
}

impl Default for MfApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for MfApiProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            asset_kinds: &[AssetKind::MutualFund],
            intraday: false,
        }
    }

    fn budget(&self) -> ProviderBudget {
        ProviderBudget::new(5, Duration::from_secs(2 * 60), Duration::from_secs(10))
    }

    async fn fetch_quote(
        &self,
        symbol: &str,
        kind: AssetKind,
    ) -> Result<PriceQuote, MarketDataError> {
        if !self.capabilities().supports(kind) {
            return Err(MarketDataError::UnsupportedAssetKind(kind.to_string()));
        }

        let scheme_code = symbol.trim();
        if scheme_code.is_empty() || !scheme_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(MarketDataError::SymbolNotFound(symbol.to_string()));
        }

        let url = format!("{}/{}", self.base_url, scheme_code);
        let body = retry_with_backoff(&self.retry, PROVIDER_ID, || {
            get_text(&self.client, PROVIDER_ID, scheme_code, &url)
        })
        .await?;

        Self::scheme_to_quote(scheme_code, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SCHEME_BODY: &str = r#"{
        "meta": {
            "fund_house": "Axis Mutual Fund",
            "scheme_type": "Open Ended Schemes",
            "scheme_category": "Equity Scheme - ELSS",
            "scheme_code": 120503,
            "scheme_name": "Axis ELSS Tax Saver Fund - Direct Plan - Growth"
        },
        "data": [
            {"date": "16-10-2025", "nav": "98.76540"},
            {"date": "15-10-2025", "nav": "97.50000"},
            {"date": "14-10-2025", "nav": "97.10000"}
        ],
        "status": "SUCCESS"
    }"#;

    #[test]
    fn test_scheme_to_quote() {
        let quote = MfApiProvider::scheme_to_quote("120503", SCHEME_BODY).unwrap();

        assert_eq!(quote.symbol, "120503");
        assert_eq!(quote.price, dec!(98.7654));
        assert_eq!(quote.previous_close, Some(dec!(97.5)));
        assert_eq!(quote.change, dec!(1.2654));
        assert_eq!(quote.currency, "INR");
        assert_eq!(
            quote.trading_date,
            NaiveDate::from_ymd_opt(2025, 10, 16).unwrap()
        );
        assert!(!quote.is_live_session);
    }

    #[test]
    fn test_single_nav_has_no_change() {
        let body = r#"{"meta":{},"data":[{"date":"01-04-2025","nav":"10.0000"}],"status":"SUCCESS"}"#;
        let quote = MfApiProvider::scheme_to_quote("150001", body).unwrap();
        assert_eq!(quote.previous_close, None);
        assert_eq!(quote.change, Decimal::ZERO);
    }

    #[test]
    fn test_empty_history_is_symbol_not_found() {
        let body = r#"{"meta":{},"data":[],"status":"SUCCESS"}"#;
        let result = MfApiProvider::scheme_to_quote("999999", body);
        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(_))));
    }

    #[test]
    fn test_bad_date_is_invalid_quote() {
        let body = r#"{"data":[{"date":"2025-10-16","nav":"10.0"}],"status":"SUCCESS"}"#;
        let result = MfApiProvider::scheme_to_quote("120503", body);
        assert!(matches!(result, Err(MarketDataError::InvalidQuote { .. })));
    }

    #[tokio::test]
    async fn test_non_numeric_scheme_code_is_rejected_without_a_call() {
        let provider = MfApiProvider::new();
        let result = provider.fetch_quote("AXIS-ELSS", AssetKind::MutualFund).await;
        assert!(matches!(result, Err(MarketDataError::SymbolNotFound(_))));

        let result = provider.fetch_quote("120503", AssetKind::Equity).await;
        assert!(matches!(result, Err(MarketDataError::UnsupportedAssetKind(_))));
    }
}

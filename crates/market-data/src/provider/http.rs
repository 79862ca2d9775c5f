//! HTTP plumbing shared by the provider adapters.

use std::time::Duration;

use log::debug;
use reqwest::{header, Client, StatusCode};

use crate::errors::MarketDataError;

/// Browser User-Agent; several upstreams reject the default reqwest one.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Build the client every adapter uses.
pub(crate) fn build_client(timeout: Duration) -> Client {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_static(BROWSER_USER_AGENT),
    );

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Map a transport error into the provider's error space.
pub(crate) fn map_request_error(provider: &str, e: reqwest::Error) -> MarketDataError {
    if e.is_timeout() {
        MarketDataError::Timeout {
            provider: provider.to_string(),
        }
    } else {
        MarketDataError::Network(e)
    }
}

/// Classify a non-success status.
///
/// 404 means the upstream does not know `symbol`; 429 is rate limiting;
/// everything else is a provider failure.
pub(crate) fn status_error(provider: &str, symbol: &str, status: StatusCode) -> MarketDataError {
    match status {
        StatusCode::NOT_FOUND => MarketDataError::SymbolNotFound(symbol.to_string()),
        StatusCode::TOO_MANY_REQUESTS => MarketDataError::RateLimited {
            provider: provider.to_string(),
        },
        _ => MarketDataError::ProviderError {
            provider: provider.to_string(),
            message: format!("HTTP {}", status),
        },
    }
}

/// GET `url` and return the body of a successful response.
pub(crate) async fn get_text(
    client: &Client,
    provider: &str,
    symbol: &str,
    url: &str,
) -> Result<String, MarketDataError> {
    debug!("{} request: {}", provider, url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| map_request_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(status_error(provider, symbol, status));
    }

    response
        .text()
        .await
        .map_err(|e| map_request_error(provider, e))
}

/// Parse a JSON body, turning malformed payloads into provider failures.
pub(crate) fn parse_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    body: &str,
) -> Result<T, MarketDataError> {
    serde_json::from_str(body).map_err(|e| MarketDataError::ProviderError {
        provider: provider.to_string(),
        message: format!("Failed to parse response: {}", e),
    })
}

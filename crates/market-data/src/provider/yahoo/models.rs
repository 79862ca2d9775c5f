//! Yahoo Finance chart API response models.
//!
//! Only the `meta` block of the v8 chart endpoint is read; it carries the
//! regular market price, the previous close and the exchange offset.

use serde::Deserialize;

/// Top-level wrapper of `/v8/finance/chart/{symbol}`
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooChartError>,
}

/// Error block, e.g. `{"code": "Not Found", "description": "No data found, symbol may be delisted"}`
#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: YahooChartMeta,
}

/// Quote metadata from the chart endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub currency: Option<String>,
    pub regular_market_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub chart_previous_close: Option<f64>,
    /// Unix seconds of the last regular-session trade
    pub regular_market_time: Option<i64>,
    /// Exchange offset from UTC in seconds
    #[serde(rename = "gmtoffset")]
    pub gmt_offset: Option<i32>,
}

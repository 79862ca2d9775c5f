use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use pricekeeper_core::prices::{PriceRequest, PriceResult};
use pricekeeper_market_data::AssetKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceQuery {
    asset_kind: Option<String>,
    #[serde(default)]
    force_refresh: bool,
}

/// Parse an optional asset kind, defaulting to equity.
pub(crate) fn parse_asset_kind(raw: Option<&str>) -> ApiResult<AssetKind> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(AssetKind::default()),
        Some(value) => value.parse::<AssetKind>().map_err(ApiError::BadRequest),
    }
}

async fn get_price(
    Path(symbol): Path<String>,
    Query(query): Query<PriceQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PriceResult>> {
    let kind = parse_asset_kind(query.asset_kind.as_deref())?;
    let result = state
        .price_service
        .get_price(&symbol, kind, query.force_refresh)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkPriceRequest {
    symbols: Vec<PriceRequest>,
    #[serde(default)]
    force_refresh: bool,
}

async fn get_bulk_prices(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkPriceRequest>,
) -> ApiResult<Json<HashMap<String, PriceResult>>> {
    let prices = state
        .price_service
        .get_bulk_prices(body.symbols, body.force_refresh)
        .await;
    Ok(Json(prices))
}

#[derive(Debug, Default, Deserialize)]
struct ClearCacheQuery {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClearCacheResponse {
    cleared: usize,
}

async fn clear_cache(
    Query(query): Query<ClearCacheQuery>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ClearCacheResponse>> {
    let cleared = state.price_service.clear_cache(query.confirm).await?;
    Ok(Json(ClearCacheResponse { cleared }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/prices/bulk", post(get_bulk_prices))
        .route("/prices/cache", delete(clear_cache))
        .route("/prices/{symbol}", get(get_price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_asset_kind() {
        assert_eq!(parse_asset_kind(None).unwrap(), AssetKind::Equity);
        assert_eq!(parse_asset_kind(Some(" ")).unwrap(), AssetKind::Equity);
        assert_eq!(parse_asset_kind(Some("mf")).unwrap(), AssetKind::MutualFund);
        assert!(matches!(
            parse_asset_kind(Some("BOND")),
            Err(ApiError::BadRequest(_))
        ));
    }
}

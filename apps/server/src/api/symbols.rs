use std::sync::Arc;

use crate::{api::prices::parse_asset_kind, error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use pricekeeper_core::sync::SymbolPriority;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterSymbolRequest {
    asset_kind: Option<String>,
    #[serde(default)]
    priority: i32,
}

/// Register a held symbol so the scheduler keeps it warm.
async fn register_symbol(
    Path(symbol): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterSymbolRequest>,
) -> ApiResult<Json<SymbolPriority>> {
    let kind = parse_asset_kind(body.asset_kind.as_deref())?;
    let registered = state
        .price_service
        .register_symbol(&symbol, kind, body.priority)
        .await?;
    Ok(Json(registered))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/symbols/{symbol}", put(register_symbol))
}

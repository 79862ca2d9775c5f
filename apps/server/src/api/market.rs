use std::sync::Arc;

use crate::main_lib::AppState;
use axum::{extract::State, routing::get, Json, Router};
use pricekeeper_market_data::MarketStatus;

async fn get_market_status(State(state): State<Arc<AppState>>) -> Json<MarketStatus> {
    Json(state.price_service.get_market_status().await)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/market/status", get(get_market_status))
}

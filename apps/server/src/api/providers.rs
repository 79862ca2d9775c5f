use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pricekeeper_market_data::ProviderHealth;

async fn get_provider_health(State(state): State<Arc<AppState>>) -> Json<Vec<ProviderHealth>> {
    Json(state.price_service.provider_health())
}

/// Force a provider's circuit closed.
async fn reset_provider(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.price_service.reset_circuit(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers/health", get(get_provider_health))
        .route("/providers/{id}/reset", post(reset_provider))
}

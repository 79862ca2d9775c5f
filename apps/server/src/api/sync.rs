use std::sync::Arc;

use crate::{error::ApiResult, main_lib::AppState};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use pricekeeper_core::sync::{ManualSyncResult, SyncStatusReport};

/// Fast sync of the top symbols; rejected while another run is active.
async fn trigger_manual_sync(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ManualSyncResult>> {
    let result = state.sync_scheduler.trigger_manual_sync().await?;
    Ok(Json(result))
}

async fn get_sync_status(State(state): State<Arc<AppState>>) -> ApiResult<Json<SyncStatusReport>> {
    let status = state.sync_scheduler.status().await?;
    Ok(Json(status))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/manual", post(trigger_manual_sync))
        .route("/sync/status", get(get_sync_status))
}

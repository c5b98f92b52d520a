//! Store status endpoint.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tandem_engine::AdapterStatus;

use crate::AppState;

/// Status response: one entry per store, as the adapters report themselves.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub store_a: AdapterStatus,
    pub store_b: AdapterStatus,
    pub timestamp: DateTime<Utc>,
}

/// Create status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status_handler))
}

/// GET /status - report both stores' health.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let (store_a, store_b) = state.engine.statuses().await;

    Json(StatusResponse {
        store_a,
        store_b,
        timestamp: Utc::now(),
    })
}

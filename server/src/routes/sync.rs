//! Sync trigger endpoint.

use axum::{extract::State, routing::post, Json, Router};
use tandem_engine::{Error as EngineError, SyncResult};

use crate::error::{AppError, Result};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/sync", post(sync_handler))
}

/// POST /sync - run one reconciliation cycle.
///
/// Cycle failures (read/write/ambiguous) are normal responses with
/// `success: false`; only a busy engine rejects the request itself.
async fn sync_handler(State(state): State<AppState>) -> Result<Json<SyncResult>> {
    let result = state.engine.run_once().await.map_err(|err| match err {
        EngineError::CycleInFlight => AppError::SyncInFlight,
        other => AppError::Internal(other.to_string()),
    })?;

    Ok(Json(result))
}

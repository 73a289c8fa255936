//! Maintenance handlers
//!
//! POST /maintenance/reconcile

use axum::{extract::State, routing::post, Json, Router};

use crate::error::ApiResult;
use crate::models::ReconcileReport;
use crate::AppState;

/// POST /maintenance/reconcile
///
/// Runs one reconciliation pass with every storage writer held off.
pub async fn reconcile(State(state): State<AppState>) -> ApiResult<Json<ReconcileReport>> {
    let _storage = state.storage_guard.write().await;

    match state.reconciler.reconcile(&state.db, &state.event_bus).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            state.record_error(format!("Reconciliation failed: {}", e)).await;
            Err(e.into())
        }
    }
}

pub fn maintenance_routes() -> Router<AppState> {
    Router::new().route("/maintenance/reconcile", post(reconcile))
}

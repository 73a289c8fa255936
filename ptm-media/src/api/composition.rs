//! Composition and export handlers
//!
//! GET /tests/:test_id/composition, POST /tests/:test_id/export

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use ptm_common::db::{assets, sync};
use ptm_common::events::MediaEvent;
use ptm_common::models::{AssetKind, ForceSample, MediaAsset, PullTest};
use tracing::warn;
use uuid::Uuid;

use crate::api::require_test;
use crate::error::{ApiError, ApiResult};
use crate::models::CompositionPlan;
use crate::services::{plan_composition, tester_binary};
use crate::AppState;

/// Samples of the test's tester file; empty when it has none or it cannot be read
async fn load_samples(state: &AppState, test_assets: &[MediaAsset]) -> Vec<ForceSample> {
    let Some(tester) = test_assets.iter().find(|a| a.kind == AssetKind::TesterBinary) else {
        return Vec::new();
    };
    let path = state.storage.absolute_path(&tester.relative_path);

    match tokio::task::spawn_blocking(move || tester_binary::decode_file(&path)).await {
        Ok(Ok(samples)) => samples,
        Ok(Err(e)) => {
            warn!(asset_id = %tester.id, error = %e, "Tester file unreadable, no force overlay");
            Vec::new()
        }
        Err(e) => {
            warn!(asset_id = %tester.id, error = %e, "Tester decode task failed");
            Vec::new()
        }
    }
}

/// Plan for a test from its stored configuration
async fn build_plan(state: &AppState, test: &PullTest) -> ApiResult<CompositionPlan> {
    let config = sync::load_or_default(&state.db, test.id).await?;
    let test_assets = assets::load_assets_for_test(&state.db, test.id).await?;

    let find = |id: Uuid| test_assets.iter().find(|a| a.id == id && a.is_video());
    let primary = config
        .primary_asset_id
        .and_then(find)
        .ok_or_else(|| ApiError::BadRequest("No primary video selected".to_string()))?;
    let equipment = config.equipment_asset_id.and_then(find);

    let samples = load_samples(state, &test_assets).await;
    Ok(plan_composition(test, primary, equipment, &config, &samples)?)
}

/// GET /tests/:test_id/composition
pub async fn get_composition(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<Json<CompositionPlan>> {
    let test = require_test(&state, test_id).await?;
    Ok(Json(build_plan(&state, &test).await?))
}

/// POST /tests/:test_id/export
pub async fn export_composition(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<MediaAsset>)> {
    let test = require_test(&state, test_id).await?;
    let plan = build_plan(&state, &test).await?;

    let lock = state.import_lock(test_id).await;
    let _import = lock.lock().await;
    let _storage = state.storage_guard.read().await;

    let exported = match state.exporter.export(&plan, &test).await {
        Ok(asset) => asset,
        Err(e) => {
            state.event_bus.emit_lossy(MediaEvent::ExportFailed {
                test_id,
                error: e.to_string(),
                timestamp: Utc::now(),
            });
            state.record_error(e.to_string()).await;
            return Err(e.into());
        }
    };

    if let Err(e) = assets::insert_asset(&state.db, &exported).await {
        if let Err(cleanup) = state.storage.remove_file(&exported.relative_path) {
            warn!(path = %exported.relative_path, error = %cleanup, "Failed to remove unrecorded export");
        }
        return Err(e.into());
    }

    state.event_bus.emit_lossy(MediaEvent::ExportCompleted {
        test_id,
        asset_id: exported.id,
        timestamp: Utc::now(),
    });
    Ok((StatusCode::CREATED, Json(exported)))
}

pub fn composition_routes() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/composition", get(get_composition))
        .route("/tests/:test_id/export", post(export_composition))
}

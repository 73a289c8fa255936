//! Asset handlers
//!
//! GET /tests/:test_id/assets, POST /tests/:test_id/assets/candidates,
//! POST /tests/:test_id/assets/import, DELETE /tests/:test_id/assets/:asset_id

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use ptm_common::db::assets;
use ptm_common::models::{AssetKind, MediaAsset, VideoRole};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::api::require_test;
use crate::error::{ApiError, ApiResult};
use crate::models::ImportCandidate;
use crate::services::build_candidates;
use crate::AppState;

/// POST /tests/:test_id/assets/candidates request
#[derive(Debug, Deserialize)]
pub struct CandidatesRequest {
    pub paths: Vec<PathBuf>,
}

/// Review choice for the candidate at the same index
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSelection {
    pub kind: Option<AssetKind>,
    pub role: Option<VideoRole>,
}

/// POST /tests/:test_id/assets/import request
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub selections: Vec<CandidateSelection>,
}

/// POST /tests/:test_id/assets/import response
#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: Vec<MediaAsset>,
}

/// GET /tests/:test_id/assets
pub async fn list_assets(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<Json<Vec<MediaAsset>>> {
    require_test(&state, test_id).await?;
    Ok(Json(assets::load_assets_for_test(&state.db, test_id).await?))
}

/// POST /tests/:test_id/assets/candidates
///
/// Suggested kinds and roles for review; nothing is copied.
pub async fn preview_candidates(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(request): Json<CandidatesRequest>,
) -> ApiResult<Json<Vec<ImportCandidate>>> {
    require_test(&state, test_id).await?;
    let existing = assets::load_assets_for_test(&state.db, test_id).await?;
    Ok(Json(build_candidates(&request.paths, &existing)?))
}

/// POST /tests/:test_id/assets/import
///
/// Validates the whole batch, then imports file by file. Progress goes out
/// on the event bus.
pub async fn import_assets(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(request): Json<ImportRequest>,
) -> ApiResult<(StatusCode, Json<ImportResponse>)> {
    if request.paths.is_empty() {
        return Err(ApiError::BadRequest("No files to import".to_string()));
    }
    if request.selections.len() > request.paths.len() {
        return Err(ApiError::BadRequest(format!(
            "{} selections for {} files",
            request.selections.len(),
            request.paths.len()
        )));
    }

    let test = require_test(&state, test_id).await?;
    let lock = state.import_lock(test_id).await;
    let _import = lock.lock().await;
    let _storage = state.storage_guard.read().await;

    let existing = assets::load_assets_for_test(&state.db, test_id).await?;
    let mut candidates = build_candidates(&request.paths, &existing)?;
    for (candidate, selection) in candidates.iter_mut().zip(&request.selections) {
        candidate.select(selection.kind, selection.role);
    }

    match state.pipeline.import_candidates(&candidates, &test, &existing).await {
        Ok(imported) => Ok((StatusCode::CREATED, Json(ImportResponse { imported }))),
        Err(e) => {
            state.record_error(e.to_string()).await;
            Err(e.into())
        }
    }
}

/// DELETE /tests/:test_id/assets/:asset_id
pub async fn delete_asset(
    State(state): State<AppState>,
    Path((test_id, asset_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let lock = state.import_lock(test_id).await;
    let _import = lock.lock().await;
    let _storage = state.storage_guard.read().await;

    let asset = assets::load_asset(&state.db, asset_id)
        .await?
        .filter(|a| a.test_id == test_id)
        .ok_or_else(|| ApiError::NotFound(format!("Asset not found: {}", asset_id)))?;

    state.pipeline.remove_asset(&asset).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn asset_routes() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/assets", get(list_assets))
        .route("/tests/:test_id/assets/candidates", post(preview_candidates))
        .route("/tests/:test_id/assets/import", post(import_assets))
        .route("/tests/:test_id/assets/:asset_id", delete(delete_asset))
}

//! Sync configuration handlers
//!
//! GET/PUT /tests/:test_id/sync, POST/DELETE /tests/:test_id/sync/estimate

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use ptm_common::db::{assets, sync};
use ptm_common::events::MediaEvent;
use ptm_common::models::{MediaAsset, NormalizedRect, SyncConfiguration};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::require_test;
use crate::error::{ApiError, ApiResult, MediaError};
use crate::models::SourceTimestamps;
use crate::AppState;

/// PUT /tests/:test_id/sync request; absent fields stay unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncUpdateRequest {
    pub primary_asset_id: Option<Uuid>,
    pub equipment_asset_id: Option<Uuid>,
    pub manual_offset_seconds: Option<f64>,
    pub trim_in_seconds: Option<f64>,
    pub trim_out_seconds: Option<f64>,
    pub tester_data_offset_seconds: Option<f64>,
    /// Clockwise quarter turns, any integer
    pub equipment_rotation: Option<i64>,
    pub equipment_crop: Option<NormalizedRect>,
}

/// POST/DELETE /tests/:test_id/sync/estimate response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateResponse {
    pub test_id: Uuid,
    pub status: &'static str,
}

/// GET /tests/:test_id/sync
pub async fn get_sync(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<Json<SyncConfiguration>> {
    require_test(&state, test_id).await?;
    Ok(Json(sync::load_or_default(&state.db, test_id).await?))
}

/// Video of `test_id` with the given id, or 400
async fn require_video(state: &AppState, test_id: Uuid, asset_id: Uuid) -> ApiResult<MediaAsset> {
    assets::load_asset(&state.db, asset_id)
        .await?
        .filter(|a| a.test_id == test_id && a.is_video())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("{} is not a video of test {}", asset_id, test_id))
        })
}

/// PUT /tests/:test_id/sync
pub async fn update_sync(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
    Json(request): Json<SyncUpdateRequest>,
) -> ApiResult<Json<SyncConfiguration>> {
    require_test(&state, test_id).await?;
    let mut config = sync::load_or_default(&state.db, test_id).await?;

    if let Some(id) = request.primary_asset_id {
        require_video(&state, test_id, id).await?;
        config.primary_asset_id = Some(id);
    }
    if let Some(id) = request.equipment_asset_id {
        require_video(&state, test_id, id).await?;
        config.equipment_asset_id = Some(id);
    }
    if let Some(offset) = request.manual_offset_seconds {
        if !offset.is_finite() {
            return Err(ApiError::BadRequest("Manual offset must be finite".to_string()));
        }
        config.manual_offset_seconds = offset;
    }
    if let Some(offset) = request.tester_data_offset_seconds {
        if !offset.is_finite() {
            return Err(ApiError::BadRequest("Tester data offset must be finite".to_string()));
        }
        config.tester_data_offset_seconds = offset;
    }
    if request.trim_in_seconds.is_some() || request.trim_out_seconds.is_some() {
        config.set_trim(
            request.trim_in_seconds.or(config.trim_in_seconds),
            request.trim_out_seconds.or(config.trim_out_seconds),
        )?;
    }
    if let Some(turns) = request.equipment_rotation {
        config.set_equipment_rotation(turns);
    }
    if let Some(crop) = request.equipment_crop {
        config.set_equipment_crop(crop);
    }

    sync::save_sync_config(&state.db, &config).await?;
    Ok(Json(config))
}

/// POST /tests/:test_id/sync/estimate
///
/// Starts a background estimate between the selected primary and equipment
/// videos. Returns 202; the result arrives as a `SyncEstimateCompleted` or
/// `SyncEstimateCancelled` event.
pub async fn start_estimate(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<EstimateResponse>)> {
    require_test(&state, test_id).await?;
    let config = sync::load_or_default(&state.db, test_id).await?;
    let (Some(primary_id), Some(equipment_id)) =
        (config.primary_asset_id, config.equipment_asset_id)
    else {
        return Err(ApiError::BadRequest(
            "Select a primary and an equipment video first".to_string(),
        ));
    };
    let primary = require_video(&state, test_id, primary_id).await?;
    let equipment = require_video(&state, test_id, equipment_id).await?;

    let token = CancellationToken::new();
    {
        let mut tokens = state.cancellation_tokens.write().await;
        if tokens.contains_key(&test_id) {
            return Err(ApiError::Conflict(format!(
                "An estimate is already running for test {}",
                test_id
            )));
        }
        tokens.insert(test_id, token.clone());
    }

    state.event_bus.emit_lossy(MediaEvent::SyncEstimateStarted {
        test_id,
        timestamp: Utc::now(),
    });

    let task_state = state.clone();
    tokio::spawn(async move {
        run_estimate(&task_state, test_id, &primary, &equipment, token).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(EstimateResponse {
            test_id,
            status: "started",
        }),
    ))
}

async fn run_estimate(
    state: &AppState,
    test_id: Uuid,
    primary: &MediaAsset,
    equipment: &MediaAsset,
    token: CancellationToken,
) {
    let timestamps = SourceTimestamps {
        primary: Some(primary.created_at),
        secondary: Some(equipment.created_at),
    };
    let primary_path = state.storage.absolute_path(&primary.relative_path);
    let equipment_path = state.storage.absolute_path(&equipment.relative_path);

    let result = state
        .estimator
        .estimate(&primary_path, &equipment_path, timestamps, token.clone())
        .await;

    let estimate = match result {
        Ok(estimate) => estimate,
        Err(MediaError::Cancelled) => {
            state.cancellation_tokens.write().await.remove(&test_id);
            emit_cancelled(state, test_id);
            return;
        }
        Err(e) => {
            state.cancellation_tokens.write().await.remove(&test_id);
            error!(test_id = %test_id, error = %e, "Offset estimate failed");
            state.record_error(format!("Offset estimate for {}: {}", test_id, e)).await;
            return;
        }
    };

    // The token map stays locked from the cancel check through the save, so
    // a cancel either lands before the check or finds no running estimate.
    let mut tokens = state.cancellation_tokens.write().await;
    if token.is_cancelled() {
        tokens.remove(&test_id);
        drop(tokens);
        emit_cancelled(state, test_id);
        return;
    }

    // Reload so edits made while the estimate ran are kept
    let saved = async {
        let mut config = sync::load_or_default(&state.db, test_id).await?;
        config.apply_auto_offset(estimate.offset_seconds, estimate.confidence);
        sync::save_sync_config(&state.db, &config).await
    }
    .await;
    tokens.remove(&test_id);
    drop(tokens);

    if let Err(e) = saved {
        warn!(test_id = %test_id, error = %e, "Failed to store offset estimate");
        state.record_error(format!("Storing offset estimate for {}: {}", test_id, e)).await;
        return;
    }

    state.event_bus.emit_lossy(MediaEvent::SyncEstimateCompleted {
        test_id,
        offset_seconds: estimate.offset_seconds,
        confidence: estimate.confidence,
        method: estimate.method.as_str().to_string(),
        timestamp: Utc::now(),
    });
}

fn emit_cancelled(state: &AppState, test_id: Uuid) {
    info!(test_id = %test_id, "Offset estimate cancelled");
    state.event_bus.emit_lossy(MediaEvent::SyncEstimateCancelled {
        test_id,
        timestamp: Utc::now(),
    });
}

/// DELETE /tests/:test_id/sync/estimate
pub async fn cancel_estimate(
    State(state): State<AppState>,
    Path(test_id): Path<Uuid>,
) -> ApiResult<Json<EstimateResponse>> {
    // Write lock: waits out a save in progress
    let tokens = state.cancellation_tokens.write().await;
    let token = tokens
        .get(&test_id)
        .ok_or_else(|| ApiError::NotFound(format!("No estimate running for test {}", test_id)))?;
    token.cancel();
    info!(test_id = %test_id, "Offset estimate cancellation requested");

    Ok(Json(EstimateResponse {
        test_id,
        status: "cancelling",
    }))
}

pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/tests/:test_id/sync", get(get_sync).put(update_sync))
        .route(
            "/tests/:test_id/sync/estimate",
            post(start_estimate).delete(cancel_estimate),
        )
}

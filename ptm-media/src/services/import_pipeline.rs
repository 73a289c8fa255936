//! Asset import pipeline
//!
//! Candidates are built from source paths, validated as one batch, then
//! imported strictly one after another: copy into managed storage, probe,
//! decode tester binaries, commit. Each file is committed on its own, so a
//! failure part-way leaves the files before it imported and the rest
//! untouched.
//!
//! Callers serialise imports per test (see `AppState::import_lock`).

use chrono::Utc;
use ptm_common::db::{assets, measurements, sync};
use ptm_common::events::{EventBus, MediaEvent};
use ptm_common::models::{
    AssetKind, MediaAsset, Measurement, MeasurementKind, PullTest, VideoRole,
};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::models::ImportCandidate;
use crate::services::import_validator::ImportValidator;
use crate::services::metadata_probe::{file_timestamp, MetadataProbe};
use crate::services::storage_manager::StorageManager;
use crate::services::tester_binary;

/// Candidates for `paths`, with kinds and video roles suggested
///
/// Each new video gets the first role in {anchorView, equipmentView,
/// unassigned} not already held by an existing video or an earlier
/// candidate.
pub fn build_candidates(
    paths: &[PathBuf],
    existing: &[MediaAsset],
) -> MediaResult<Vec<ImportCandidate>> {
    let mut claimed: Vec<VideoRole> = existing
        .iter()
        .filter_map(MediaAsset::video_role)
        .filter(VideoRole::is_exclusive)
        .collect();

    paths
        .iter()
        .map(|path| {
            let metadata = std::fs::metadata(path)
                .map_err(|e| MediaError::AssetNotReadable(format!("{}: {}", path.display(), e)))?;
            if !metadata.is_file() {
                return Err(MediaError::AssetNotReadable(format!(
                    "{}: not a regular file",
                    path.display()
                )));
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| MediaError::AssetNotReadable(path.display().to_string()))?;
            let kind = AssetKind::from_filename(&filename);

            let role = if kind == AssetKind::Video {
                let role = VideoRole::first_unclaimed(claimed.iter().copied());
                if role.is_exclusive() {
                    claimed.push(role);
                }
                Some(role)
            } else {
                None
            };

            Ok(ImportCandidate {
                source_path: path.clone(),
                filename,
                byte_size: metadata.len(),
                suggested_kind: kind,
                selected_kind: kind,
                role,
            })
        })
        .collect()
}

/// Import pipeline bound to its collaborators
#[derive(Clone)]
pub struct AssetImportPipeline {
    db: SqlitePool,
    storage: Arc<dyn StorageManager>,
    validator: Arc<dyn ImportValidator>,
    probe: Arc<dyn MetadataProbe>,
    event_bus: EventBus,
}

impl AssetImportPipeline {
    pub fn new(
        db: SqlitePool,
        storage: Arc<dyn StorageManager>,
        validator: Arc<dyn ImportValidator>,
        probe: Arc<dyn MetadataProbe>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            storage,
            validator,
            probe,
            event_bus,
        }
    }

    pub fn validate(&self, candidates: &[ImportCandidate], existing: &[MediaAsset]) -> MediaResult<()> {
        self.validator.validate(candidates, existing)
    }

    /// Import a reviewed batch into `test`
    ///
    /// Returns the new assets. On failure the error of the first failing
    /// file is returned; files before it stay imported.
    pub async fn import_candidates(
        &self,
        candidates: &[ImportCandidate],
        test: &PullTest,
        existing: &[MediaAsset],
    ) -> MediaResult<Vec<MediaAsset>> {
        self.validate(candidates, existing)?;

        let total = candidates.len();
        info!(test_id = %test.id, total_files = total, "Import batch started");
        self.event_bus.emit_lossy(MediaEvent::ImportStarted {
            test_id: test.id,
            total_files: total,
            timestamp: Utc::now(),
        });

        let mut imported = Vec::with_capacity(total);
        for (index, candidate) in candidates.iter().enumerate() {
            match self.import_one(candidate, test).await {
                Ok(asset) => {
                    self.event_bus.emit_lossy(MediaEvent::ImportProgress {
                        test_id: test.id,
                        current: index + 1,
                        total,
                        filename: asset.filename.clone(),
                        timestamp: Utc::now(),
                    });
                    imported.push(asset);
                }
                Err(e) => {
                    warn!(
                        test_id = %test.id,
                        file = %candidate.source_path.display(),
                        imported = imported.len(),
                        error = %e,
                        "Import batch aborted"
                    );
                    self.event_bus.emit_lossy(MediaEvent::ImportFailed {
                        test_id: test.id,
                        imported: imported.len(),
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            }
        }

        info!(test_id = %test.id, imported = imported.len(), "Import batch completed");
        self.event_bus.emit_lossy(MediaEvent::ImportCompleted {
            test_id: test.id,
            imported: imported.len(),
            timestamp: Utc::now(),
        });

        Ok(imported)
    }

    async fn import_one(&self, candidate: &ImportCandidate, test: &PullTest) -> MediaResult<MediaAsset> {
        let asset_id = Uuid::new_v4();
        let relative = self.storage.asset_path(test, asset_id, &candidate.filename);

        let storage = Arc::clone(&self.storage);
        let source = candidate.source_path.clone();
        let target = relative.clone();
        tokio::task::spawn_blocking(move || storage.store_copy(&source, &target))
            .await
            .map_err(|e| MediaError::AssetNotReadable(format!("copy task failed: {}", e)))?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                    MediaError::AssetNotReadable(format!(
                        "{}: {}",
                        candidate.source_path.display(),
                        e
                    ))
                }
                _ => MediaError::Storage(e),
            })?;

        match self.finish_import(candidate, test, asset_id, &relative).await {
            Ok(asset) => Ok(asset),
            Err(e) => {
                if let Err(cleanup) = self.storage.remove_file(&relative) {
                    warn!(path = %relative, error = %cleanup, "Failed to remove partial import");
                }
                Err(e)
            }
        }
    }

    async fn finish_import(
        &self,
        candidate: &ImportCandidate,
        test: &PullTest,
        asset_id: Uuid,
        relative: &str,
    ) -> MediaResult<MediaAsset> {
        let kind = candidate.kind();
        let stored = self.storage.absolute_path(relative);
        let probed = self.probe.probe(&stored, kind).await?;

        let mut asset = MediaAsset::new(asset_id, test.id, kind, &candidate.filename, relative);
        asset.byte_size = probed.byte_size;
        asset.content_type = probed.content_type;
        asset.content_hash = Some(probed.content_hash);
        asset.role = candidate.effective_role();
        // The stored copy carries the copy time; prefer the source's timestamp
        let source_time = std::fs::metadata(&candidate.source_path)
            .ok()
            .as_ref()
            .and_then(file_timestamp);
        if let Some(created_at) = source_time.or(probed.created_at) {
            asset.created_at = created_at;
        }
        if let Some(video) = probed.video {
            asset.duration_seconds = video.duration_seconds;
            asset.frame_rate = video.frame_rate;
            asset.pixel_width = video.pixel_width;
            asset.pixel_height = video.pixel_height;
            asset.orientation_turns = video.orientation_turns;
        }

        let peak_lbf = if kind == AssetKind::TesterBinary {
            Some(decode_peak(stored).await?)
        } else {
            None
        };

        let mut tx = self.db.begin().await.map_err(ptm_common::Error::from)?;
        assets::insert_asset(&mut *tx, &asset).await?;
        match peak_lbf {
            Some(Some(value)) => {
                let measurement = Measurement::tester_peak(test.id, value, asset.id);
                measurements::upsert_measurement(&mut *tx, &measurement).await?;
            }
            Some(None) => {
                measurements::remove_measurement(&mut *tx, test.id, MeasurementKind::TesterPeak)
                    .await?;
            }
            None => {}
        }
        tx.commit().await.map_err(ptm_common::Error::from)?;

        info!(
            test_id = %test.id,
            asset_id = %asset.id,
            kind = %asset.kind,
            path = %asset.relative_path,
            bytes = asset.byte_size,
            "Imported asset"
        );

        Ok(asset)
    }

    /// Delete an asset record; its file goes only if nothing else points at it
    pub async fn remove_asset(&self, asset: &MediaAsset) -> MediaResult<()> {
        let mut tx = self.db.begin().await.map_err(ptm_common::Error::from)?;
        assets::delete_asset(&mut *tx, asset.id).await?;

        if asset.kind == AssetKind::TesterBinary {
            let kind = MeasurementKind::TesterPeak;
            let current = measurements::load_measurement(&mut *tx, asset.test_id, kind).await?;
            if current.and_then(|m| m.source_asset_id) == Some(asset.id) {
                measurements::remove_measurement(&mut *tx, asset.test_id, kind).await?;
            }
        }

        if let Some(mut config) = sync::load_sync_config(&mut *tx, asset.test_id).await? {
            let mut changed = false;
            if config.primary_asset_id == Some(asset.id) {
                config.primary_asset_id = None;
                changed = true;
            }
            if config.equipment_asset_id == Some(asset.id) {
                config.equipment_asset_id = None;
                changed = true;
            }
            if changed {
                sync::save_sync_config(&mut *tx, &config).await?;
            }
        }

        let references = assets::count_path_references(&mut *tx, &asset.relative_path).await?;
        tx.commit().await.map_err(ptm_common::Error::from)?;

        if references == 0 {
            self.storage.remove_file(&asset.relative_path)?;
        }

        info!(
            asset_id = %asset.id,
            path = %asset.relative_path,
            file_removed = references == 0,
            "Removed asset"
        );
        Ok(())
    }
}

/// Peak force of a stored tester file; `None` when it has no usable samples
async fn decode_peak(path: PathBuf) -> MediaResult<Option<f64>> {
    let samples = tokio::task::spawn_blocking(move || tester_binary::decode_file(&path))
        .await
        .map_err(|e| MediaError::AssetNotReadable(format!("decode task failed: {}", e)))??;
    Ok(tester_binary::peak_force_lbf(&samples))
}

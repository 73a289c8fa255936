//! Export of a composition plan into managed storage
//!
//! The render itself belongs to a [`PlatformEncoder`]. The bundled
//! [`PlanManifestEncoder`] writes the plan as a JSON manifest for an
//! external renderer.

use chrono::Utc;
use ptm_common::models::{AssetKind, MediaAsset, PullTest};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::models::CompositionPlan;
use crate::services::content_hasher::hash_file;
use crate::services::storage_manager::StorageManager;

/// Renders a plan to a file
pub trait PlatformEncoder: Send + Sync {
    /// Output file name for a test's export
    fn file_name(&self, test: &PullTest) -> String;

    fn content_type(&self) -> &'static str;

    /// Write the rendered output to `output` (blocking)
    fn encode(&self, plan: &CompositionPlan, output: &Path) -> MediaResult<()>;
}

/// Writes the plan as pretty-printed JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanManifestEncoder;

impl PlatformEncoder for PlanManifestEncoder {
    fn file_name(&self, test: &PullTest) -> String {
        format!("{}-composite.json", test.storage_key())
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, plan: &CompositionPlan, output: &Path) -> MediaResult<()> {
        let mut file = std::fs::File::create(output)?;
        serde_json::to_writer_pretty(&mut file, plan)
            .map_err(|e| MediaError::ExportFailed(format!("manifest serialisation: {}", e)))?;
        file.write_all(b"\n")?;
        file.sync_all()?;
        Ok(())
    }
}

/// Runs an encoder against managed storage
#[derive(Clone)]
pub struct ExportService {
    storage: Arc<dyn StorageManager>,
    encoder: Arc<dyn PlatformEncoder>,
}

impl ExportService {
    pub fn new(storage: Arc<dyn StorageManager>, encoder: Arc<dyn PlatformEncoder>) -> Self {
        Self { storage, encoder }
    }

    /// Encode `plan` and describe the result as an export asset
    ///
    /// The caller persists the returned record. No output is left behind
    /// when encoding fails.
    pub async fn export(&self, plan: &CompositionPlan, test: &PullTest) -> MediaResult<MediaAsset> {
        let asset_id = Uuid::new_v4();
        let filename = self.encoder.file_name(test);
        let relative = self.storage.asset_path(test, asset_id, &filename);

        let storage = Arc::clone(&self.storage);
        let encoder = Arc::clone(&self.encoder);
        let owned_plan = plan.clone();
        let target = relative.clone();
        let result = tokio::task::spawn_blocking(move || -> MediaResult<(u64, String)> {
            storage.remove_file(&target)?;
            let output = storage.prepare_path(&target)?;

            let encoded = encoder.encode(&owned_plan, &output).and_then(|()| {
                let size = std::fs::metadata(&output)?.len();
                let hash = hash_file(&output)?;
                Ok((size, hash))
            });
            if encoded.is_err() {
                if let Err(e) = storage.remove_file(&target) {
                    warn!(path = %target, error = %e, "Failed to remove partial export");
                }
            }
            encoded
        })
        .await
        .map_err(|e| MediaError::ExportFailed(format!("encoder task failed: {}", e)))?;

        let (byte_size, hash) = result.map_err(|e| match e {
            MediaError::ExportFailed(_) => e,
            other => MediaError::ExportFailed(other.to_string()),
        })?;

        let mut asset = MediaAsset::new(asset_id, test.id, AssetKind::Export, filename, relative);
        asset.byte_size = byte_size;
        asset.content_hash = Some(hash);
        asset.content_type = Some(self.encoder.content_type().to_string());
        asset.created_at = Utc::now();
        asset.duration_seconds = Some(plan.duration_seconds);
        asset.frame_rate = Some(plan.frame_rate);
        asset.pixel_width = Some(plan.render_size.width.round() as u32);
        asset.pixel_height = Some(plan.render_size.height.round() as u32);

        info!(
            test_id = %test.id,
            asset_id = %asset.id,
            path = %asset.relative_path,
            bytes = asset.byte_size,
            "Exported composition"
        );
        Ok(asset)
    }
}

//! Managed storage / asset record reconciliation
//!
//! One pass:
//! 1. enumerate and hash every stored file (parallel, before any change)
//! 2. relink records whose file vanished: an unreferenced file at
//!    `{asset id}/{filename}`, else the first file with the same hash
//! 3. back-fill missing hashes and sizes
//! 4. create records for orphan files whose top-level folder names exactly
//!    one test
//! 5. collapse byte-identical files onto the lexicographically first path
//!
//! Planning is pure; [`MediaIntegrityReconciler::reconcile`] commits the
//! record changes in one transaction and deletes redundant copies only
//! afterwards. A second pass over a reconciled store changes nothing.

use chrono::{DateTime, Utc};
use ptm_common::db::{assets, pull_tests};
use ptm_common::events::{EventBus, MediaEvent};
use ptm_common::models::{AssetKind, MediaAsset, PullTest, VideoRole};
use rayon::prelude::*;
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};
use crate::models::{ReconcileOutcome, ReconcileReport, RedundantFile};
use crate::services::content_hasher::hash_file;
use crate::services::metadata_probe::{
    file_timestamp, guess_content_type, probe_video, VideoMetadata,
};
use crate::services::storage_manager::StorageManager;

/// One enumerated file with its probe results
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    pub relative_path: String,
    pub byte_size: u64,
    pub created_at: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    /// `None` when hashing failed
    pub content_hash: Option<String>,
    /// Probed for video files only
    pub video: Option<VideoMetadata>,
}

#[derive(Clone)]
pub struct MediaIntegrityReconciler {
    storage: Arc<dyn StorageManager>,
}

impl MediaIntegrityReconciler {
    pub fn new(storage: Arc<dyn StorageManager>) -> Self {
        Self { storage }
    }

    /// Enumerate and probe every stored file (blocking)
    pub fn scan(&self) -> MediaResult<Vec<ScannedFile>> {
        let paths = self.storage.list_files()?;
        debug!(files = paths.len(), "Hashing managed storage");

        let mut scanned: Vec<ScannedFile> = paths
            .par_iter()
            .filter_map(|relative| {
                let path = self.storage.absolute_path(relative);
                // Removed between enumeration and probe
                let metadata = std::fs::metadata(&path).ok()?;
                let content_hash = match hash_file(&path) {
                    Ok(hash) => Some(hash),
                    Err(e) => {
                        warn!(path = %relative, error = %e, "Hash failure");
                        None
                    }
                };
                let video = (AssetKind::from_filename(relative) == AssetKind::Video)
                    .then(|| probe_video(&path))
                    .flatten();
                Some(ScannedFile {
                    relative_path: relative.clone(),
                    byte_size: metadata.len(),
                    created_at: file_timestamp(&metadata),
                    content_type: guess_content_type(&path),
                    content_hash,
                    video,
                })
            })
            .collect();

        scanned.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Ok(scanned)
    }

    /// Scan the store and plan a pass against the given records (blocking)
    pub fn run(&self, tests: &[PullTest], assets: &[MediaAsset]) -> MediaResult<ReconcileOutcome> {
        let scanned = self.scan()?;
        Ok(plan(tests, assets, &scanned))
    }

    /// Delete redundant copies whose canonical file is still present
    ///
    /// Returns how many files were actually removed.
    pub fn remove_redundant(&self, redundant: &[RedundantFile]) -> usize {
        let mut removed = 0;
        for file in redundant {
            if !self.storage.exists(&file.canonical_path) {
                warn!(
                    path = %file.relative_path,
                    canonical = %file.canonical_path,
                    "Canonical copy missing, keeping duplicate"
                );
                continue;
            }
            match self.storage.remove_file(&file.relative_path) {
                Ok(true) => removed += 1,
                Ok(false) => debug!(path = %file.relative_path, "Duplicate already removed"),
                Err(e) => warn!(path = %file.relative_path, error = %e, "Failed to remove duplicate"),
            }
        }
        removed
    }

    /// Full pass against the record store
    pub async fn reconcile(&self, db: &SqlitePool, event_bus: &EventBus) -> MediaResult<ReconcileReport> {
        let tests = pull_tests::load_all_tests(db).await?;
        let records = assets::load_all_assets(db).await?;

        let this = self.clone();
        let outcome = tokio::task::spawn_blocking(move || this.run(&tests, &records))
            .await
            .map_err(|e| ptm_common::Error::Internal(format!("Reconcile task failed: {}", e)))??;

        let mut tx = db.begin().await.map_err(ptm_common::Error::from)?;
        for asset in &outcome.created {
            assets::insert_asset(&mut *tx, asset).await?;
        }
        for asset in &outcome.updated {
            assets::update_asset(&mut *tx, asset).await?;
        }
        tx.commit().await.map_err(ptm_common::Error::from)?;

        let this = self.clone();
        let redundant = outcome.redundant_files.clone();
        let removed = tokio::task::spawn_blocking(move || this.remove_redundant(&redundant))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Duplicate removal task failed");
                0
            });

        let report = outcome.report;
        info!(
            relinked = report.relinked,
            created = report.created,
            deduplicated = report.deduplicated,
            removed = removed,
            repointed = report.repointed,
            backfilled = report.backfilled,
            skipped_unmapped = report.skipped_unmapped_files,
            skipped_ambiguous = report.skipped_ambiguous_files,
            hash_failures = report.hash_failures,
            "Reconciliation complete"
        );
        event_bus.emit_lossy(MediaEvent::ReconcileCompleted {
            relinked: report.relinked,
            created: report.created,
            deduplicated: report.deduplicated,
            repointed: report.repointed,
            skipped: report.skipped(),
            hash_failures: report.hash_failures,
            timestamp: Utc::now(),
        });

        Ok(report)
    }
}

fn top_level_folder(relative: &str) -> Option<&str> {
    let (folder, rest) = relative.split_once('/')?;
    (!folder.is_empty() && !rest.is_empty()).then_some(folder)
}

/// True when `relative` ends in `{asset_id}/{filename}`
fn matches_layout(relative: &str, asset: &MediaAsset) -> bool {
    let mut parts = relative.rsplit('/');
    let name = parts.next();
    let folder = parts.next();
    name == Some(asset.filename.as_str()) && folder == Some(asset.id.to_string().as_str())
}

/// Decide every change for one pass
///
/// `scanned` must be sorted by relative path.
pub fn plan(tests: &[PullTest], assets: &[MediaAsset], scanned: &[ScannedFile]) -> ReconcileOutcome {
    let mut report = ReconcileReport {
        hash_failures: scanned.iter().filter(|f| f.content_hash.is_none()).count(),
        ..ReconcileReport::default()
    };

    let files: BTreeMap<&str, &ScannedFile> =
        scanned.iter().map(|f| (f.relative_path.as_str(), f)).collect();
    let mut records: Vec<MediaAsset> = assets.to_vec();
    let mut changed: HashSet<Uuid> = HashSet::new();

    // Relink records whose file is gone
    let mut referenced: HashSet<String> = records.iter().map(|a| a.relative_path.clone()).collect();
    for record in records.iter_mut() {
        if files.contains_key(record.relative_path.as_str()) {
            continue;
        }

        let by_layout: Vec<&str> = files
            .keys()
            .copied()
            .filter(|path| !referenced.contains(*path) && matches_layout(path, record))
            .collect();
        let target = if by_layout.len() == 1 {
            Some(by_layout[0].to_string())
        } else {
            // First path with identical content, referenced or not: it is the
            // copy deduplication keeps, so records may share it
            record.content_hash.as_deref().and_then(|hash| {
                scanned
                    .iter()
                    .find(|f| f.content_hash.as_deref() == Some(hash))
                    .map(|f| f.relative_path.clone())
            })
        };

        if let Some(target) = target {
            debug!(asset_id = %record.id, from = %record.relative_path, to = %target, "Relinked asset");
            record.relative_path = target.clone();
            referenced.insert(target);
            changed.insert(record.id);
            report.relinked += 1;
        }
    }

    // Back-fill probe results on records whose file exists
    for record in records.iter_mut() {
        let Some(file) = files.get(record.relative_path.as_str()) else {
            continue;
        };
        let mut filled = false;
        if record.content_hash.is_none() && file.content_hash.is_some() {
            record.content_hash = file.content_hash.clone();
            filled = true;
        }
        if record.byte_size == 0 && file.byte_size > 0 {
            record.byte_size = file.byte_size;
            filled = true;
        }
        if record.content_type.is_none() && file.content_type.is_some() {
            record.content_type = file.content_type.clone();
            filled = true;
        }
        if filled {
            changed.insert(record.id);
            report.backfilled += 1;
        }
    }

    // Orphans
    let referenced: HashSet<&str> = records.iter().map(|a| a.relative_path.as_str()).collect();
    let mut used_ids: HashSet<Uuid> = records.iter().map(|a| a.id).collect();
    let mut created: Vec<MediaAsset> = Vec::new();

    for file in scanned.iter().filter(|f| !referenced.contains(f.relative_path.as_str())) {
        let Some(folder) = top_level_folder(&file.relative_path) else {
            report.skipped_unmapped_files += 1;
            continue;
        };

        let matched: Vec<&PullTest> = tests
            .iter()
            .filter(|t| t.folder_keys().iter().any(|k| k == folder))
            .collect();
        let test = match matched.as_slice() {
            [] => {
                report.skipped_unmapped_files += 1;
                continue;
            }
            [test] => *test,
            _ => {
                let err = MediaError::AmbiguousMatch(file.relative_path.clone());
                warn!(error = %err, tests = matched.len(), "Skipping orphan");
                report.skipped_ambiguous_files += 1;
                continue;
            }
        };

        let parts: Vec<&str> = file.relative_path.split('/').collect();
        let filename = parts.last().copied().unwrap_or_default().to_string();
        let id = (parts.len() >= 3)
            .then(|| Uuid::parse_str(parts[parts.len() - 2]).ok())
            .flatten()
            .filter(|id| !used_ids.contains(id))
            .unwrap_or_else(Uuid::new_v4);
        used_ids.insert(id);

        let kind = AssetKind::from_filename(&filename);
        let mut asset = MediaAsset::new(id, test.id, kind, filename, file.relative_path.clone());
        asset.byte_size = file.byte_size;
        asset.content_hash = file.content_hash.clone();
        asset.content_type = file.content_type.clone();
        if let Some(created_at) = file.created_at {
            asset.created_at = created_at;
        }
        if let Some(video) = file.video.as_ref().filter(|_| kind == AssetKind::Video) {
            asset.duration_seconds = video.duration_seconds;
            asset.frame_rate = video.frame_rate;
            asset.pixel_width = video.pixel_width;
            asset.pixel_height = video.pixel_height;
            asset.orientation_turns = video.orientation_turns;
        }
        if kind == AssetKind::Video {
            let claimed = records
                .iter()
                .chain(created.iter())
                .filter(|a| a.test_id == test.id)
                .filter_map(MediaAsset::video_role);
            asset.role = Some(VideoRole::first_unclaimed(claimed));
        }

        debug!(path = %file.relative_path, test_id = %test.id, kind = %kind, "Adopted orphan file");
        report.created += 1;
        created.push(asset);
    }

    // Deduplicate
    let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for file in scanned {
        if let Some(hash) = file.content_hash.as_deref() {
            groups.entry(hash).or_default().push(file.relative_path.as_str());
        }
    }

    let mut redundant_files = Vec::new();
    for paths in groups.values().filter(|paths| paths.len() > 1) {
        let canonical = paths[0];
        for &duplicate in &paths[1..] {
            redundant_files.push(RedundantFile {
                relative_path: duplicate.to_string(),
                canonical_path: canonical.to_string(),
            });
            report.deduplicated += 1;

            for record in records.iter_mut().filter(|a| a.relative_path == duplicate) {
                record.relative_path = canonical.to_string();
                changed.insert(record.id);
                report.repointed += 1;
            }
            for record in created.iter_mut().filter(|a| a.relative_path == duplicate) {
                record.relative_path = canonical.to_string();
                report.repointed += 1;
            }
        }
    }

    let updated = records
        .into_iter()
        .filter(|a| changed.contains(&a.id))
        .collect();

    ReconcileOutcome {
        report,
        created,
        updated,
        redundant_files,
    }
}

//! Integrity reconciliation results

use ptm_common::models::MediaAsset;
use serde::Serialize;

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Records with a missing file pointed back at a surviving copy
    pub relinked: usize,
    /// Records created for orphan files
    pub created: usize,
    /// Redundant copies deleted
    pub deduplicated: usize,
    /// Records moved onto a canonical path
    pub repointed: usize,
    /// Records whose missing hash or size was filled in
    pub backfilled: usize,
    pub skipped_unmapped_files: usize,
    pub skipped_ambiguous_files: usize,
    pub hash_failures: usize,
}

impl ReconcileReport {
    /// Mutations this pass performs; zero on an already-reconciled store
    pub fn total_changes(&self) -> usize {
        self.relinked + self.created + self.deduplicated + self.repointed + self.backfilled
    }

    pub fn skipped(&self) -> usize {
        self.skipped_unmapped_files + self.skipped_ambiguous_files
    }
}

/// A byte-identical copy slated for deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantFile {
    pub relative_path: String,
    /// Surviving copy every reference now points at
    pub canonical_path: String,
}

/// Everything a pass decided, ready to be applied
///
/// `updated` holds the final state of every pre-existing record that
/// changed; `created` the new records (already repointed if their file was
/// a redundant copy). `redundant_files` are deleted only after the records
/// are committed.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub report: ReconcileReport,
    pub created: Vec<MediaAsset>,
    pub updated: Vec<MediaAsset>,
    pub redundant_files: Vec<RedundantFile>,
}

impl ReconcileOutcome {
    /// Apply the record changes to an in-memory asset list
    pub fn apply_to(&self, assets: &mut Vec<MediaAsset>) {
        for updated in &self.updated {
            if let Some(existing) = assets.iter_mut().find(|a| a.id == updated.id) {
                *existing = updated.clone();
            }
        }
        assets.extend(self.created.iter().cloned());
    }

    pub fn is_noop(&self) -> bool {
        self.report.total_changes() == 0
    }
}

//! Import review records

use ptm_common::models::{AssetKind, VideoRole};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file proposed for import, before anything is copied
///
/// Lives only for the duration of the review step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportCandidate {
    pub source_path: PathBuf,
    pub filename: String,
    pub byte_size: u64,
    /// Kind inferred from the file extension
    pub suggested_kind: AssetKind,
    /// Kind chosen by the user (defaults to the suggestion)
    pub selected_kind: AssetKind,
    /// Only meaningful for videos
    pub role: Option<VideoRole>,
}

impl ImportCandidate {
    pub fn kind(&self) -> AssetKind {
        self.selected_kind
    }

    pub fn is_video(&self) -> bool {
        self.selected_kind == AssetKind::Video
    }

    /// Lowercased extension of the original filename
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Apply the user's review choices
    pub fn select(&mut self, kind: Option<AssetKind>, role: Option<VideoRole>) {
        if let Some(kind) = kind {
            self.selected_kind = kind;
        }
        if role.is_some() {
            self.role = role;
        }
        if !self.is_video() {
            self.role = None;
        }
    }

    /// Role the asset ends up with; `None` for non-video kinds
    pub fn effective_role(&self) -> Option<VideoRole> {
        if self.is_video() {
            Some(self.role.unwrap_or(VideoRole::Unassigned))
        } else {
            None
        }
    }
}

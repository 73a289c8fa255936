//! Media asset records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Kind of file attached to a pull test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Video,
    Photo,
    Export,
    Document,
    TesterBinary,
}

impl AssetKind {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Video => "video",
            AssetKind::Photo => "photo",
            AssetKind::Export => "export",
            AssetKind::Document => "document",
            AssetKind::TesterBinary => "testerBinary",
        }
    }

    /// Suggest a kind from a file extension (case-insensitive)
    ///
    /// Unknown extensions are treated as documents.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "mov" | "mp4" | "m4v" => AssetKind::Video,
            "jpg" | "jpeg" | "png" | "heic" | "heif" => AssetKind::Photo,
            "lby" => AssetKind::TesterBinary,
            _ => AssetKind::Document,
        }
    }

    /// Suggest a kind from a file name or path
    pub fn from_filename(name: &str) -> Self {
        std::path::Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(AssetKind::Document)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(AssetKind::Video),
            "photo" => Ok(AssetKind::Photo),
            "export" => Ok(AssetKind::Export),
            "document" => Ok(AssetKind::Document),
            "testerBinary" => Ok(AssetKind::TesterBinary),
            other => Err(Error::InvalidInput(format!("Unknown asset kind: {}", other))),
        }
    }
}

/// Which camera a video shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoRole {
    AnchorView,
    EquipmentView,
    Unassigned,
}

impl VideoRole {
    /// Order in which roles are handed out to newly added videos
    pub const ASSIGNMENT_ORDER: [VideoRole; 3] = [
        VideoRole::AnchorView,
        VideoRole::EquipmentView,
        VideoRole::Unassigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoRole::AnchorView => "anchorView",
            VideoRole::EquipmentView => "equipmentView",
            VideoRole::Unassigned => "unassigned",
        }
    }

    /// True for roles that only one video per test may hold
    pub fn is_exclusive(&self) -> bool {
        !matches!(self, VideoRole::Unassigned)
    }

    /// First role in assignment order that none of `claimed` holds
    ///
    /// `Unassigned` is never claimed, so this always returns a role.
    pub fn first_unclaimed<I>(claimed: I) -> VideoRole
    where
        I: IntoIterator<Item = VideoRole>,
    {
        let claimed: Vec<VideoRole> = claimed.into_iter().collect();
        Self::ASSIGNMENT_ORDER
            .into_iter()
            .find(|role| !role.is_exclusive() || !claimed.contains(role))
            .unwrap_or(VideoRole::Unassigned)
    }
}

impl fmt::Display for VideoRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anchorView" => Ok(VideoRole::AnchorView),
            "equipmentView" => Ok(VideoRole::EquipmentView),
            "unassigned" => Ok(VideoRole::Unassigned),
            other => Err(Error::InvalidInput(format!("Unknown video role: {}", other))),
        }
    }
}

/// A file attached to a pull test and kept in managed storage
///
/// `test_id` is a lookup key for the owning test, not an owning reference.
/// `relative_path` is always `/`-separated and relative to the managed
/// storage root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: Uuid,
    pub test_id: Uuid,
    pub kind: AssetKind,
    pub filename: String,
    pub relative_path: String,
    pub created_at: DateTime<Utc>,
    pub byte_size: u64,
    pub content_type: Option<String>,
    pub content_hash: Option<String>,

    // Video-only fields
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
    /// Intrinsic orientation as clockwise quarter turns (0..=3)
    #[serde(default)]
    pub orientation_turns: u8,
    pub role: Option<VideoRole>,
}

impl MediaAsset {
    /// Create a record with no probed metadata yet
    pub fn new(
        id: Uuid,
        test_id: Uuid,
        kind: AssetKind,
        filename: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self {
            id,
            test_id,
            kind,
            filename: filename.into(),
            relative_path: relative_path.into(),
            created_at: Utc::now(),
            byte_size: 0,
            content_type: None,
            content_hash: None,
            duration_seconds: None,
            frame_rate: None,
            pixel_width: None,
            pixel_height: None,
            orientation_turns: 0,
            role: if kind == AssetKind::Video {
                Some(VideoRole::Unassigned)
            } else {
                None
            },
        }
    }

    pub fn is_video(&self) -> bool {
        self.kind == AssetKind::Video
    }

    /// Role of a video asset; `None` for other kinds
    pub fn video_role(&self) -> Option<VideoRole> {
        if self.is_video() {
            Some(self.role.unwrap_or(VideoRole::Unassigned))
        } else {
            None
        }
    }

    /// Lower-cased file extension, if any
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

//! Composition plan handed to the platform encoder
//!
//! All overlay timing is expressed as fractions (0..=1) of the visible
//! duration so keyframes hold at any render frame rate.

use ptm_common::models::NormalizedRect;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::geometry::{AffineTransform, ContentMode, Rect, Size};

/// Stacking position of a video track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackLayer {
    Primary,
    PictureInPicture,
}

/// One video source placed in the render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPlacement {
    pub asset_id: Uuid,
    pub relative_path: String,
    pub layer: TrackLayer,
    /// Position in the source where playback starts
    pub source_start_seconds: f64,
    pub duration_seconds: f64,
    pub destination: Rect,
    pub content_mode: ContentMode,
    pub rotation_quarter_turns: u8,
    pub crop: NormalizedRect,
    /// Source pixel space to render pixel space
    pub transform: AffineTransform,
}

/// Semi-opaque text panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoBox {
    pub frame: Rect,
    pub background_opacity: f64,
    pub lines: Vec<String>,
}

/// Point of the force curve, in render coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub x: f64,
    pub y: f64,
}

/// Static force-vs-time curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceGraph {
    pub frame: Rect,
    pub background_opacity: f64,
    /// Force mapped to the top edge of the frame
    pub max_force_lbf: f64,
    pub points: Vec<GraphPoint>,
}

/// Marker position at a point of the timeline (interpolated between keys)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointKeyframe {
    pub fraction: f64,
    pub x: f64,
    pub y: f64,
}

/// Text shown from `fraction` until the next key (no interpolation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextKeyframe {
    pub fraction: f64,
    pub text: String,
}

/// Overlay layers drawn above the video tracks, in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Overlay {
    InfoBox(InfoBox),
    ForceGraph(ForceGraph),
    ForceMarker {
        radius: f64,
        keyframes: Vec<PointKeyframe>,
    },
    ForceReadout {
        frame: Rect,
        keyframes: Vec<TextKeyframe>,
    },
}

/// Renderable instructions for one export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionPlan {
    pub test_id: Uuid,
    pub render_size: Size,
    pub frame_rate: f64,
    /// Visible (trimmed) duration
    pub duration_seconds: f64,
    pub tracks: Vec<TrackPlacement>,
    pub overlays: Vec<Overlay>,
}

impl CompositionPlan {
    pub fn track(&self, layer: TrackLayer) -> Option<&TrackPlacement> {
        self.tracks.iter().find(|t| t.layer == layer)
    }
}

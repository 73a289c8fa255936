//! Composition planning
//!
//! Turns a test's sync configuration, its selected videos and the decoded
//! tester samples into a [`CompositionPlan`]: the primary video trimmed and
//! full frame, the equipment video as a bottom-leading picture-in-picture,
//! and the info box / force graph overlays. Overlay timing is expressed as
//! fractions of the visible duration.

use ptm_common::models::{ForceSample, MediaAsset, NormalizedRect, PullTest, SyncConfiguration};
use tracing::debug;

use crate::error::{MediaError, MediaResult};
use crate::models::{
    AffineTransform, CompositionPlan, ContentMode, ForceGraph, GraphPoint, InfoBox, Overlay,
    PointKeyframe, Rect, Size, TextKeyframe, TrackLayer, TrackPlacement,
};
use crate::services::geometry_resolver::{oriented_size, placed_transform};

/// Used when the primary video reports no frame rate
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Picture-in-picture size relative to the render
pub const PIP_SCALE: f64 = 0.3;

/// Margin around anchored overlays, relative to the shorter render side
const MARGIN_FRACTION: f64 = 0.03;

const INFO_BOX_WIDTH: f64 = 0.35;
const INFO_BOX_HEIGHT: f64 = 0.12;
const GRAPH_WIDTH: f64 = 0.35;
const GRAPH_HEIGHT: f64 = 0.25;
const READOUT_HEIGHT: f64 = 0.05;
const OVERLAY_OPACITY: f64 = 0.6;
const MARKER_RADIUS_FRACTION: f64 = 0.008;

/// Validated visible window on the primary timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    pub fn from_sync(sync: &SyncConfiguration) -> MediaResult<Self> {
        let (Some(trim_in), Some(trim_out)) = (sync.trim_in_seconds, sync.trim_out_seconds) else {
            return Err(MediaError::TrimRangeRequired);
        };
        if !trim_in.is_finite() || !trim_out.is_finite() || trim_out <= trim_in {
            return Err(MediaError::InvalidTrimRange { trim_in, trim_out });
        }
        Ok(Self {
            start: trim_in,
            end: trim_out,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Position of a primary-timeline time within the window (0..=1)
    pub fn fraction(&self, time: f64) -> f64 {
        ((time - self.start) / self.duration()).clamp(0.0, 1.0)
    }
}

/// Upright pixel size of a video asset
fn video_geometry(asset: &MediaAsset) -> MediaResult<(Size, AffineTransform)> {
    let (Some(width), Some(height)) = (asset.pixel_width, asset.pixel_height) else {
        return Err(MediaError::AssetNotReadable(format!(
            "{}: no video dimensions",
            asset.relative_path
        )));
    };
    let natural = Size::new(f64::from(width), f64::from(height));
    if !natural.is_drawable() {
        return Err(MediaError::AssetNotReadable(format!(
            "{}: empty video frame",
            asset.relative_path
        )));
    }
    let orientation = AffineTransform::quarter_turns(i64::from(asset.orientation_turns));
    Ok((natural, orientation))
}

/// Adhesive label cut at its first `-`, joined with the anchor label
pub fn short_label(test: &PullTest) -> Option<String> {
    let adhesive = test
        .adhesive
        .as_deref()
        .map(|a| a.split('-').next().unwrap_or_default().trim())
        .filter(|a| !a.is_empty());
    let anchor = test.anchor.as_deref().map(str::trim).filter(|a| !a.is_empty());

    match (adhesive, anchor) {
        (Some(adhesive), Some(anchor)) => Some(format!("{} / {}", adhesive, anchor)),
        (Some(label), None) | (None, Some(label)) => Some(label.to_string()),
        (None, None) => None,
    }
}

/// Build the plan for one export
pub fn plan_composition(
    test: &PullTest,
    primary: &MediaAsset,
    equipment: Option<&MediaAsset>,
    sync: &SyncConfiguration,
    samples: &[ForceSample],
) -> MediaResult<CompositionPlan> {
    let window = TrimWindow::from_sync(sync)?;
    let (natural, orientation) = video_geometry(primary)?;
    let render_size = oriented_size(natural, &orientation);
    let frame_rate = primary
        .frame_rate
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .unwrap_or(DEFAULT_FRAME_RATE);
    let margin = MARGIN_FRACTION * render_size.width.min(render_size.height);

    let full_frame = Rect::from_size(render_size);
    let mut tracks = vec![TrackPlacement {
        asset_id: primary.id,
        relative_path: primary.relative_path.clone(),
        layer: TrackLayer::Primary,
        source_start_seconds: window.start,
        duration_seconds: window.duration(),
        destination: full_frame,
        content_mode: ContentMode::Fill,
        rotation_quarter_turns: 0,
        crop: NormalizedRect::FULL,
        transform: placed_transform(
            natural,
            &orientation,
            &full_frame,
            ContentMode::Fill,
            0,
            &NormalizedRect::FULL,
        ),
    }];

    if let Some(equipment) = equipment {
        let (natural, orientation) = video_geometry(equipment)?;
        let pip_width = render_size.width * PIP_SCALE;
        let pip_height = render_size.height * PIP_SCALE;
        let destination = Rect::new(
            margin,
            render_size.height - margin - pip_height,
            pip_width,
            pip_height,
        );
        let rotation = sync.equipment_rotation();
        let crop = sync.equipment_crop();

        tracks.push(TrackPlacement {
            asset_id: equipment.id,
            relative_path: equipment.relative_path.clone(),
            layer: TrackLayer::PictureInPicture,
            source_start_seconds: (window.start + sync.effective_offset()).max(0.0),
            duration_seconds: window.duration(),
            destination,
            content_mode: ContentMode::FitLeading,
            rotation_quarter_turns: rotation,
            crop,
            transform: placed_transform(
                natural,
                &orientation,
                &destination,
                ContentMode::FitLeading,
                i64::from(rotation),
                &crop,
            ),
        });
    }

    let mut lines = vec![test.display_id()];
    lines.extend(short_label(test));
    let mut overlays = vec![Overlay::InfoBox(InfoBox {
        frame: Rect::new(
            margin,
            margin,
            render_size.width * INFO_BOX_WIDTH,
            render_size.height * INFO_BOX_HEIGHT,
        ),
        background_opacity: OVERLAY_OPACITY,
        lines,
    })];

    overlays.extend(force_overlays(render_size, margin, &window, sync, samples));

    debug!(
        test_id = %test.id,
        width = render_size.width,
        height = render_size.height,
        tracks = tracks.len(),
        overlays = overlays.len(),
        "Planned composition"
    );

    Ok(CompositionPlan {
        test_id: test.id,
        render_size,
        frame_rate,
        duration_seconds: window.duration(),
        tracks,
        overlays,
    })
}

/// Graph, marker and readout for the samples inside the visible window
///
/// Empty when no sample lands inside the window after shifting.
fn force_overlays(
    render_size: Size,
    margin: f64,
    window: &TrimWindow,
    sync: &SyncConfiguration,
    samples: &[ForceSample],
) -> Vec<Overlay> {
    let shift = sync.tester_data_offset_seconds - sync.effective_offset();
    let visible: Vec<(f64, f64)> = samples
        .iter()
        .filter(|s| s.force_kn.is_finite())
        .map(|s| (s.time_seconds + shift, s.force_lbs()))
        .filter(|(t, _)| *t >= window.start && *t <= window.end)
        .collect();
    if visible.is_empty() {
        return Vec::new();
    }

    let peak = visible.iter().map(|(_, f)| *f).fold(0.0_f64, f64::max);
    let max_force_lbf = if peak > 0.0 { peak } else { 1.0 };

    let graph_width = render_size.width * GRAPH_WIDTH;
    let graph_height = render_size.height * GRAPH_HEIGHT;
    let frame = Rect::new(
        render_size.width - margin - graph_width,
        render_size.height - margin - graph_height,
        graph_width,
        graph_height,
    );

    let mut points = Vec::with_capacity(visible.len());
    let mut marker = Vec::with_capacity(visible.len());
    let mut readout = Vec::with_capacity(visible.len());
    for &(time, force) in &visible {
        let fraction = window.fraction(time);
        let level = (force / max_force_lbf).clamp(0.0, 1.0);
        let point = GraphPoint {
            x: frame.x + fraction * frame.width,
            y: frame.y + (1.0 - level) * frame.height,
        };
        points.push(point);
        marker.push(PointKeyframe {
            fraction,
            x: point.x,
            y: point.y,
        });
        readout.push(TextKeyframe {
            fraction,
            text: format!("{:.0} lbf", force.max(0.0)),
        });
    }

    let readout_height = render_size.height * READOUT_HEIGHT;
    vec![
        Overlay::ForceGraph(ForceGraph {
            frame,
            background_opacity: OVERLAY_OPACITY,
            max_force_lbf,
            points,
        }),
        Overlay::ForceMarker {
            radius: MARKER_RADIUS_FRACTION * render_size.width.min(render_size.height),
            keyframes: marker,
        },
        Overlay::ForceReadout {
            frame: Rect::new(frame.x, frame.y - readout_height, frame.width, readout_height),
            keyframes: readout,
        },
    ]
}

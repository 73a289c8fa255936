//! Media service data models

mod composition;
mod geometry;
mod import;
mod offset;
mod reconcile;

pub use composition::{
    CompositionPlan, ForceGraph, GraphPoint, InfoBox, Overlay, PointKeyframe, TextKeyframe,
    TrackLayer, TrackPlacement,
};
pub use geometry::{AffineTransform, ContentMode, Rect, Size};
pub use import::ImportCandidate;
pub use offset::{Envelope, EnvelopeBuilder, EstimateMethod, OffsetEstimate, SourceTimestamps};
pub use reconcile::{ReconcileOutcome, ReconcileReport, RedundantFile};

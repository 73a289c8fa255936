//! Clap-based offset estimation between two recordings
//!
//! Each recording's audio is reduced to an amplitude envelope (1024-frame
//! windows, first 20 s). The first loud transient after 50 ms is taken as
//! the clap; the difference of clap times is the offset. When either side
//! has no usable audio, or the result is implausible, the file creation
//! times are used instead.
//!
//! The result is a suggestion for the user to confirm or correct, never an
//! exact synchronisation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::models::{Envelope, EstimateMethod, OffsetEstimate, SourceTimestamps};
use crate::utils::decode_envelope;

pub const ENVELOPE_WINDOW_FRAMES: usize = 1024;
pub const ANALYSIS_SECONDS: f64 = 20.0;

/// Estimates outside this bound fall back to creation times
pub const PLAUSIBLE_OFFSET_SECONDS: f64 = 20.0;
/// Final clamp for any estimate
pub const MAX_OFFSET_SECONDS: f64 = 60.0;

const MIN_TRANSIENT_TIME: f64 = 0.05;
const TRANSIENT_THRESHOLD: f32 = 0.7;
const PROMINENCE_MIN: f64 = 0.05;
const PROMINENCE_MAX: f64 = 0.99;
const CONFIDENCE_MIN: f64 = 0.15;
const CONFIDENCE_MAX: f64 = 0.98;
const TIMESTAMP_CONFIDENCE: f64 = 0.25;
const NO_DATA_CONFIDENCE: f64 = 0.1;

/// Detected clap in one envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transient {
    pub time_seconds: f64,
    pub amplitude: f32,
    pub prominence: f64,
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.is_empty() {
        0.0
    } else if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Find the clap transient of an envelope
///
/// First value at or after 50 ms reaching 70% of the global peak, else the
/// global peak itself. Silent or empty envelopes have no transient.
pub fn detect_transient(envelope: &Envelope) -> Option<Transient> {
    let (peak_index, peak) = envelope
        .values
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(&b.1))?;
    if peak <= 0.0 {
        return None;
    }

    let threshold = TRANSIENT_THRESHOLD * peak;
    let index = envelope
        .values
        .iter()
        .enumerate()
        .position(|(i, &v)| envelope.time_at(i) >= MIN_TRANSIENT_TIME && v >= threshold)
        .unwrap_or(peak_index);

    let amplitude = envelope.values[index];
    let floor = median(&envelope.values);
    let prominence = (f64::from(amplitude - floor) / f64::from(amplitude).max(f64::EPSILON))
        .clamp(PROMINENCE_MIN, PROMINENCE_MAX);

    Some(Transient {
        time_seconds: envelope.time_at(index),
        amplitude,
        prominence,
    })
}

/// Offset from the two envelopes' transients, if plausible
///
/// Positive offsets mean the clap happens later in the secondary recording.
pub fn estimate_from_envelopes(primary: &Envelope, secondary: &Envelope) -> Option<OffsetEstimate> {
    let first = detect_transient(primary)?;
    let second = detect_transient(secondary)?;

    let offset = second.time_seconds - first.time_seconds;
    let confidence =
        ((first.prominence + second.prominence) / 2.0).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX);

    debug!(
        primary_time = first.time_seconds,
        secondary_time = second.time_seconds,
        offset = offset,
        confidence = confidence,
        "Transient pair detected"
    );

    if offset.abs() > PLAUSIBLE_OFFSET_SECONDS {
        info!(offset = offset, "Transient offset outside plausible range, ignoring");
        return None;
    }

    Some(OffsetEstimate {
        offset_seconds: offset.clamp(-MAX_OFFSET_SECONDS, MAX_OFFSET_SECONDS),
        confidence,
        method: EstimateMethod::AudioTransient,
    })
}

/// Estimate from file creation times
pub fn timestamp_fallback(timestamps: SourceTimestamps) -> OffsetEstimate {
    match (timestamps.primary, timestamps.secondary) {
        (Some(primary), Some(secondary)) => {
            let delta = secondary.signed_duration_since(primary);
            let seconds = delta.num_milliseconds() as f64 / 1000.0;
            OffsetEstimate {
                offset_seconds: seconds.clamp(-MAX_OFFSET_SECONDS, MAX_OFFSET_SECONDS),
                confidence: TIMESTAMP_CONFIDENCE,
                method: EstimateMethod::CreationTimestamps,
            }
        }
        _ => OffsetEstimate {
            offset_seconds: 0.0,
            confidence: NO_DATA_CONFIDENCE,
            method: EstimateMethod::NoData,
        },
    }
}

/// Full fallback chain over whatever envelopes could be extracted
pub fn estimate_offset(
    primary: Option<&Envelope>,
    secondary: Option<&Envelope>,
    timestamps: SourceTimestamps,
) -> OffsetEstimate {
    if let (Some(primary), Some(secondary)) = (primary, secondary) {
        if let Some(estimate) = estimate_from_envelopes(primary, secondary) {
            return estimate;
        }
    }
    timestamp_fallback(timestamps)
}

/// Capability: suggest the offset between two recordings
#[async_trait]
pub trait SyncEstimator: Send + Sync {
    /// Never fails for missing or poor audio; only cancellation is an error
    async fn estimate(
        &self,
        primary: &Path,
        secondary: &Path,
        timestamps: SourceTimestamps,
        cancel: CancellationToken,
    ) -> MediaResult<OffsetEstimate>;
}

/// Default estimator: symphonia envelopes plus the fallback chain
#[derive(Debug, Clone)]
pub struct EnvelopeSyncEstimator {
    window_frames: usize,
    analysis_seconds: f64,
}

impl EnvelopeSyncEstimator {
    pub fn new() -> Self {
        Self {
            window_frames: ENVELOPE_WINDOW_FRAMES,
            analysis_seconds: ANALYSIS_SECONDS,
        }
    }

    async fn envelope_for(&self, path: &Path, cancel: &CancellationToken) -> Option<Envelope> {
        let path_buf: PathBuf = path.to_path_buf();
        let window_frames = self.window_frames;
        let analysis_seconds = self.analysis_seconds;
        let token = cancel.clone();

        let result = tokio::task::spawn_blocking(move || {
            decode_envelope(&path_buf, window_frames, analysis_seconds, &token)
        })
        .await;

        match result {
            Ok(Ok(envelope)) => Some(envelope),
            Ok(Err(e)) => {
                if !cancel.is_cancelled() {
                    warn!(path = %path.display(), error = %e, "No usable audio, using fallback");
                }
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Envelope task failed");
                None
            }
        }
    }
}

impl Default for EnvelopeSyncEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncEstimator for EnvelopeSyncEstimator {
    async fn estimate(
        &self,
        primary: &Path,
        secondary: &Path,
        timestamps: SourceTimestamps,
        cancel: CancellationToken,
    ) -> MediaResult<OffsetEstimate> {
        let (primary_env, secondary_env) = tokio::join!(
            self.envelope_for(primary, &cancel),
            self.envelope_for(secondary, &cancel)
        );

        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }

        let estimate = estimate_offset(primary_env.as_ref(), secondary_env.as_ref(), timestamps);
        info!(
            offset_seconds = estimate.offset_seconds,
            confidence = estimate.confidence,
            method = estimate.method.as_str(),
            "Offset estimated"
        );
        Ok(estimate)
    }
}

//! Tester binary (LBY) decoder
//!
//! The force tester writes a run of little-endian `i32` words (milli-kN, one
//! every 0.5 s) after a header of undeclared length. The payload start is
//! found by scanning for the first 80-byte window that carries real signal
//! variation; the scan constants are empirical and must stay as they are for
//! peak values to match files decoded elsewhere.

use ptm_common::models::{ForceSample, KN_TO_LBF};
use std::path::Path;
use tracing::debug;

/// File extension of tester binaries (compared case-insensitively)
pub const TESTER_EXTENSION: &str = "lby";

/// Sample cadence
pub const SAMPLE_INTERVAL_SECONDS: f64 = 0.5;

const SCAN_START: usize = 256;
const SCAN_END: usize = 800;
const SCAN_STEP: usize = 4;
const SCAN_TAIL: usize = 100;
const WINDOW_BYTES: usize = 80;
const MAX_PLAUSIBLE_RAW: i32 = 100_000;
const MIN_VARIATION: i32 = 100;
const FALLBACK_OFFSET: usize = 608;
const RAW_TO_KN: f64 = 0.001;

fn words(bytes: &[u8]) -> impl Iterator<Item = i32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|w| i32::from_le_bytes([w[0], w[1], w[2], w[3]]))
}

/// True when `path` has the tester binary extension
pub fn is_tester_binary(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(TESTER_EXTENSION))
        .unwrap_or(false)
}

/// Byte offset where the sample payload starts
pub fn locate_payload_offset(bytes: &[u8]) -> usize {
    let upper = SCAN_END.min(SCAN_START.max(bytes.len().saturating_sub(SCAN_TAIL)));

    for offset in (SCAN_START..=upper).step_by(SCAN_STEP) {
        if offset + WINDOW_BYTES > bytes.len() {
            break;
        }

        let plausible: Vec<i32> = words(&bytes[offset..offset + WINDOW_BYTES])
            .filter(|&v| v > 0 && v < MAX_PLAUSIBLE_RAW)
            .collect();
        let (Some(min), Some(max)) = (plausible.iter().min(), plausible.iter().max()) else {
            continue;
        };
        if max - min > MIN_VARIATION {
            return offset;
        }
    }

    FALLBACK_OFFSET.min(bytes.len())
}

/// Decode a tester buffer into samples
///
/// Never fails: empty or malformed input yields whatever words are present
/// after the located offset (possibly none). A trailing partial word is
/// ignored.
pub fn parse_samples(bytes: &[u8]) -> Vec<ForceSample> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let offset = locate_payload_offset(bytes);
    let samples: Vec<ForceSample> = words(&bytes[offset..])
        .enumerate()
        .map(|(i, raw)| {
            ForceSample::new(i as f64 * SAMPLE_INTERVAL_SECONDS, f64::from(raw) * RAW_TO_KN)
        })
        .collect();

    debug!(
        total_bytes = bytes.len(),
        payload_offset = offset,
        samples = samples.len(),
        "Decoded tester binary"
    );

    samples
}

/// Samples of a named buffer; empty unless the name has the tester extension
pub fn parse_named(path: &Path, bytes: &[u8]) -> Vec<ForceSample> {
    if !is_tester_binary(path) {
        return Vec::new();
    }
    parse_samples(bytes)
}

/// Read and decode a tester file
///
/// Only I/O errors are reported; files without the tester extension decode
/// to an empty list without being read.
pub fn decode_file(path: &Path) -> std::io::Result<Vec<ForceSample>> {
    if !is_tester_binary(path) {
        return Ok(Vec::new());
    }
    let bytes = std::fs::read(path)?;
    Ok(parse_samples(&bytes))
}

/// Largest positive, finite force in kN
pub fn peak_force_kn(samples: &[ForceSample]) -> Option<f64> {
    samples
        .iter()
        .map(|s| s.force_kn)
        .filter(|f| f.is_finite() && *f > 0.0)
        .reduce(f64::max)
}

/// Largest positive, finite force in lbf
pub fn peak_force_lbf(samples: &[ForceSample]) -> Option<f64> {
    peak_force_kn(samples).map(|kn| kn * KN_TO_LBF)
}

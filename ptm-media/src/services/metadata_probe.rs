//! Stored-file metadata probing
//!
//! Size, content type, digest and timestamps for every file; duration,
//! frame size and frame rate for videos via ffprobe. Video inspection is
//! best effort: a file ffprobe cannot read keeps empty video fields.
//!
//! The typed ffprobe output carries no rotation, so orientation comes from a
//! second, narrow ffprobe query read as raw JSON.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ffprobe::ffprobe;
use ptm_common::models::{normalize_quarter_turns, AssetKind};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{MediaError, MediaResult};
use crate::services::content_hasher::hash_file;

/// Video track properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoMetadata {
    pub duration_seconds: Option<f64>,
    pub frame_rate: Option<f64>,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
    /// Clockwise quarter turns that bring the stored frames upright
    pub orientation_turns: u8,
}

/// Everything probed from one stored file
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMetadata {
    pub byte_size: u64,
    pub content_type: Option<String>,
    pub content_hash: String,
    pub created_at: Option<DateTime<Utc>>,
    pub video: Option<VideoMetadata>,
}

/// Capability: inspect a stored file
#[async_trait]
pub trait MetadataProbe: Send + Sync {
    async fn probe(&self, path: &Path, kind: AssetKind) -> MediaResult<ProbedMetadata>;
}

/// MIME type from magic bytes, else from the extension
pub fn guess_content_type(path: &Path) -> Option<String> {
    if let Ok(Some(kind)) = infer::get_from_path(path) {
        return Some(kind.mime_type().to_string());
    }

    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mov" => "video/quicktime",
        "mp4" | "m4v" => "video/mp4",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    };
    Some(mime.to_string())
}

/// Creation time of a file, falling back to modification time
pub fn file_timestamp(metadata: &std::fs::Metadata) -> Option<DateTime<Utc>> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Parse ffprobe rates such as `30000/1001` or `25`
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Nearest clockwise quarter turns for a rotation in degrees
pub fn degrees_to_quarter_turns(clockwise_degrees: f64) -> u8 {
    if !clockwise_degrees.is_finite() {
        return 0;
    }
    normalize_quarter_turns((clockwise_degrees / 90.0).round() as i64)
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Orientation of the first stream in `ffprobe -print_format json` output
///
/// Display-matrix side data holds counter-clockwise degrees and wins over the
/// legacy `rotate` tag, which holds clockwise degrees.
pub fn orientation_from_ffprobe_json(json: &Value) -> u8 {
    let Some(stream) = json["streams"].as_array().and_then(|s| s.first()) else {
        return 0;
    };

    let display_matrix = stream["side_data_list"]
        .as_array()
        .into_iter()
        .flatten()
        .find_map(|side_data| json_number(&side_data["rotation"]))
        .map(|counter_clockwise| -counter_clockwise);
    let rotate_tag = json_number(&stream["tags"]["rotate"]);

    display_matrix
        .or(rotate_tag)
        .map(degrees_to_quarter_turns)
        .unwrap_or(0)
}

/// Rotation of the first video stream; 0 when ffprobe reports none
pub fn probe_orientation(path: &Path) -> u8 {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream_tags=rotate:stream_side_data=rotation",
        ])
        .arg(path)
        .output();

    let output = match output {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::debug!(path = %path.display(), status = %output.status, "No rotation reported");
            return 0;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ffprobe rotation query failed");
            return 0;
        }
    };

    match serde_json::from_slice::<Value>(&output.stdout) {
        Ok(json) => orientation_from_ffprobe_json(&json),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unparseable ffprobe rotation output");
            0
        }
    }
}

/// Inspect the first video stream with ffprobe; `None` when unreadable
pub fn probe_video(path: &Path) -> Option<VideoMetadata> {
    let metadata = match ffprobe(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = ?e,
                "ffprobe failed, video fields left empty"
            );
            return None;
        }
    };

    let stream = metadata
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let duration_seconds = stream
        .duration
        .as_deref()
        .or(metadata.format.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);
    let frame_rate = parse_frame_rate(&stream.avg_frame_rate)
        .or_else(|| parse_frame_rate(&stream.r_frame_rate));

    Some(VideoMetadata {
        duration_seconds,
        frame_rate,
        pixel_width: stream.width.and_then(|w| u32::try_from(w).ok()),
        pixel_height: stream.height.and_then(|h| u32::try_from(h).ok()),
        orientation_turns: probe_orientation(path),
    })
}

/// Probe a file synchronously
pub fn probe_file(path: &Path, kind: AssetKind) -> MediaResult<ProbedMetadata> {
    let metadata = std::fs::metadata(path)?;
    let content_hash = hash_file(path).map_err(|e| MediaError::HashFailure {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let video = if kind == AssetKind::Video {
        probe_video(path)
    } else {
        None
    };

    Ok(ProbedMetadata {
        byte_size: metadata.len(),
        content_type: guess_content_type(path),
        content_hash,
        created_at: file_timestamp(&metadata),
        video,
    })
}

/// Default probe: filesystem metadata, SHA-256 and ffprobe
#[derive(Debug, Clone, Default)]
pub struct FileMetadataProbe;

#[async_trait]
impl MetadataProbe for FileMetadataProbe {
    async fn probe(&self, path: &Path, kind: AssetKind) -> MediaResult<ProbedMetadata> {
        let path_buf: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe_file(&path_buf, kind))
            .await
            .map_err(|e| MediaError::AssetNotReadable(format!("probe task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_parsing() {
        assert_eq!(parse_frame_rate("30"), Some(30.0));
        assert_eq!(parse_frame_rate("30000/1001"), Some(30000.0 / 1001.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
    }

    #[test]
    fn test_content_type_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lby");
        std::fs::write(&path, [0u8; 16]).unwrap();
        assert_eq!(
            guess_content_type(&path).as_deref(),
            Some("application/octet-stream")
        );

        let png = dir.path().join("photo.bin");
        std::fs::write(&png, [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]).unwrap();
        assert_eq!(guess_content_type(&png).as_deref(), Some("image/png"));
    }

    #[test]
    fn test_rotation_to_quarter_turns() {
        assert_eq!(degrees_to_quarter_turns(0.0), 0);
        assert_eq!(degrees_to_quarter_turns(90.0), 1);
        assert_eq!(degrees_to_quarter_turns(-90.0), 3);
        assert_eq!(degrees_to_quarter_turns(180.0), 2);
        assert_eq!(degrees_to_quarter_turns(-270.0), 1);
        assert_eq!(degrees_to_quarter_turns(88.5), 1);
        assert_eq!(degrees_to_quarter_turns(f64::NAN), 0);
    }

    #[test]
    fn test_orientation_from_ffprobe_json() {
        // Phone clip held upright: display matrix -90 means a clockwise turn
        let side_data = serde_json::json!({
            "streams": [{
                "side_data_list": [{ "side_data_type": "Display Matrix", "rotation": -90 }]
            }]
        });
        assert_eq!(orientation_from_ffprobe_json(&side_data), 1);

        let tag_only = serde_json::json!({ "streams": [{ "tags": { "rotate": "270" } }] });
        assert_eq!(orientation_from_ffprobe_json(&tag_only), 3);

        let both = serde_json::json!({
            "streams": [{
                "tags": { "rotate": "90" },
                "side_data_list": [{ "rotation": 180.0 }]
            }]
        });
        assert_eq!(orientation_from_ffprobe_json(&both), 2);

        assert_eq!(orientation_from_ffprobe_json(&serde_json::json!({ "streams": [{}] })), 0);
        assert_eq!(orientation_from_ffprobe_json(&serde_json::json!({})), 0);
    }

    #[tokio::test]
    async fn test_probe_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"abc").unwrap();

        let probed = FileMetadataProbe.probe(&path, AssetKind::Document).await.unwrap();
        assert_eq!(probed.byte_size, 3);
        assert_eq!(
            probed.content_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(probed.video.is_none());
        assert!(probed.created_at.is_some());
    }

    #[tokio::test]
    async fn test_unreadable_video_keeps_empty_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mov");
        std::fs::write(&path, b"not a movie").unwrap();

        let probed = FileMetadataProbe.probe(&path, AssetKind::Video).await.unwrap();
        assert_eq!(probed.byte_size, 11);
        assert!(probed.video.is_none());
    }
}

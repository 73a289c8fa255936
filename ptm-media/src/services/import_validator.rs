//! Import policy checks
//!
//! Runs over the whole batch before any file is copied; the first
//! violation aborts the batch.

use ptm_common::models::{AssetKind, MediaAsset, VideoRole};

use crate::error::{MediaError, MediaResult};
use crate::models::ImportCandidate;

pub const MAX_VIDEOS_PER_TEST: usize = 2;
pub const MAX_TESTER_FILES_PER_TEST: usize = 1;
pub const MAX_VIDEO_BYTES: u64 = 1024 * 1024 * 1024;
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v"];

/// Capability: accept or reject a batch against a test's existing assets
pub trait ImportValidator: Send + Sync {
    fn validate(&self, candidates: &[ImportCandidate], existing: &[MediaAsset]) -> MediaResult<()>;
}

/// The fixed import policy
#[derive(Debug, Clone)]
pub struct ImportPolicy {
    pub max_videos: usize,
    pub max_tester_files: usize,
    pub max_video_bytes: u64,
    pub video_extensions: &'static [&'static str],
}

impl Default for ImportPolicy {
    fn default() -> Self {
        Self {
            max_videos: MAX_VIDEOS_PER_TEST,
            max_tester_files: MAX_TESTER_FILES_PER_TEST,
            max_video_bytes: MAX_VIDEO_BYTES,
            video_extensions: VIDEO_EXTENSIONS,
        }
    }
}

impl ImportValidator for ImportPolicy {
    fn validate(&self, candidates: &[ImportCandidate], existing: &[MediaAsset]) -> MediaResult<()> {
        let mut videos = existing.iter().filter(|a| a.kind == AssetKind::Video).count();
        let mut tester_files = existing
            .iter()
            .filter(|a| a.kind == AssetKind::TesterBinary)
            .count();
        let mut claimed: Vec<VideoRole> = existing
            .iter()
            .filter_map(MediaAsset::video_role)
            .filter(VideoRole::is_exclusive)
            .collect();

        for candidate in candidates {
            match candidate.kind() {
                AssetKind::Video => {
                    videos += 1;
                    if videos > self.max_videos {
                        return Err(MediaError::TooManyVideos {
                            limit: self.max_videos,
                        });
                    }

                    let extension = candidate.extension().unwrap_or_default();
                    if !self.video_extensions.contains(&extension.as_str()) {
                        return Err(MediaError::UnsupportedFileType(candidate.filename.clone()));
                    }

                    if candidate.byte_size > self.max_video_bytes {
                        return Err(MediaError::FileTooLarge {
                            path: candidate.source_path.clone(),
                            size: candidate.byte_size,
                            limit: self.max_video_bytes,
                        });
                    }

                    if let Some(role) = candidate.effective_role().filter(VideoRole::is_exclusive) {
                        if claimed.contains(&role) {
                            return Err(MediaError::DuplicateVideoRole(role.to_string()));
                        }
                        claimed.push(role);
                    }
                }
                AssetKind::TesterBinary => {
                    tester_files += 1;
                    if tester_files > self.max_tester_files {
                        return Err(MediaError::TooManyTesterFiles {
                            limit: self.max_tester_files,
                        });
                    }
                }
                AssetKind::Photo | AssetKind::Export | AssetKind::Document => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn candidate(name: &str, kind: AssetKind, role: Option<VideoRole>, size: u64) -> ImportCandidate {
        ImportCandidate {
            source_path: PathBuf::from("/import").join(name),
            filename: name.to_string(),
            byte_size: size,
            suggested_kind: AssetKind::from_filename(name),
            selected_kind: kind,
            role,
        }
    }

    fn existing_video(test_id: Uuid, role: VideoRole) -> MediaAsset {
        let mut asset = MediaAsset::new(
            Uuid::new_v4(),
            test_id,
            AssetKind::Video,
            "old.mov",
            "T/x/old.mov",
        );
        asset.role = Some(role);
        asset
    }

    #[test]
    fn test_third_video_is_rejected() {
        let test_id = Uuid::new_v4();
        let existing = vec![
            existing_video(test_id, VideoRole::AnchorView),
            existing_video(test_id, VideoRole::EquipmentView),
        ];
        let batch = vec![candidate("c.mov", AssetKind::Video, Some(VideoRole::Unassigned), 10)];

        let err = ImportPolicy::default().validate(&batch, &existing).unwrap_err();
        assert!(matches!(err, MediaError::TooManyVideos { limit: 2 }));
    }

    #[test]
    fn test_held_role_is_rejected() {
        let test_id = Uuid::new_v4();
        let existing = vec![existing_video(test_id, VideoRole::AnchorView)];
        let batch = vec![candidate("b.mp4", AssetKind::Video, Some(VideoRole::AnchorView), 10)];

        let err = ImportPolicy::default().validate(&batch, &existing).unwrap_err();
        assert!(matches!(err, MediaError::DuplicateVideoRole(_)));
    }

    #[test]
    fn test_duplicate_role_within_batch_is_rejected() {
        let batch = vec![
            candidate("a.mov", AssetKind::Video, Some(VideoRole::EquipmentView), 10),
            candidate("b.mov", AssetKind::Video, Some(VideoRole::EquipmentView), 10),
        ];
        let err = ImportPolicy::default().validate(&batch, &[]).unwrap_err();
        assert!(matches!(err, MediaError::DuplicateVideoRole(_)));
    }

    #[test]
    fn test_unassigned_role_may_repeat() {
        let batch = vec![
            candidate("a.mov", AssetKind::Video, Some(VideoRole::Unassigned), 10),
            candidate("b.m4v", AssetKind::Video, None, 10),
        ];
        assert!(ImportPolicy::default().validate(&batch, &[]).is_ok());
    }

    #[test]
    fn test_video_extension_and_size() {
        let batch = vec![candidate("clip.avi", AssetKind::Video, None, 10)];
        let err = ImportPolicy::default().validate(&batch, &[]).unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedFileType(_)));

        let batch = vec![candidate("clip.MOV", AssetKind::Video, None, MAX_VIDEO_BYTES + 1)];
        let err = ImportPolicy::default().validate(&batch, &[]).unwrap_err();
        assert!(matches!(err, MediaError::FileTooLarge { .. }));

        let batch = vec![candidate("clip.mov", AssetKind::Video, None, MAX_VIDEO_BYTES)];
        assert!(ImportPolicy::default().validate(&batch, &[]).is_ok());
    }

    #[test]
    fn test_second_tester_file_is_rejected() {
        let batch = vec![
            candidate("run1.lby", AssetKind::TesterBinary, None, 10),
            candidate("run2.lby", AssetKind::TesterBinary, None, 10),
        ];
        let err = ImportPolicy::default().validate(&batch, &[]).unwrap_err();
        assert!(matches!(err, MediaError::TooManyTesterFiles { limit: 1 }));
    }

    #[test]
    fn test_photos_and_documents_are_unlimited() {
        let batch: Vec<ImportCandidate> = (0..10)
            .map(|i| candidate(&format!("p{}.jpg", i), AssetKind::Photo, None, 10))
            .collect();
        assert!(ImportPolicy::default().validate(&batch, &[]).is_ok());
    }
}

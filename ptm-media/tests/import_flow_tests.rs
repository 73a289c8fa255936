//! Import pipeline against a real database and managed storage

mod helpers;

use async_trait::async_trait;
use helpers::{create_test_state, seed_test};
use ptm_common::db::{assets, measurements, sync};
use ptm_common::events::MediaEvent;
use ptm_common::models::{AssetKind, Measurement, MeasurementKind, VideoRole, KN_TO_LBF};
use ptm_media::services::metadata_probe::VideoMetadata;
use ptm_media::services::{
    build_candidates, hash_file, plan_composition, AssetImportPipeline, ImportPolicy,
    MetadataProbe, ProbedMetadata, StorageManager,
};
use ptm_media::{MediaError, MediaResult};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Tester file whose payload ramps 1..=50 kN starting at byte 400
fn tester_bytes() -> Vec<u8> {
    let mut bytes = vec![0u8; 400];
    for i in 1..=50i32 {
        bytes.extend_from_slice(&(i * 1000).to_le_bytes());
    }
    bytes
}

#[tokio::test]
async fn test_import_stores_files_and_tester_peak() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("PT 42")).await;
    let mut events = state.event_bus.subscribe();

    let photo = ctx.source_file("bolt.jpg", b"\xFF\xD8\xFF\xE0 not really a jpeg");
    let tester = ctx.source_file("run.LBY", &tester_bytes());

    let candidates = build_candidates(&[photo.clone(), tester], &[]).unwrap();
    let imported = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap();
    assert_eq!(imported.len(), 2);

    let stored_photo = &imported[0];
    assert_eq!(stored_photo.kind, AssetKind::Photo);
    assert_eq!(
        stored_photo.relative_path,
        format!("PT-42/{}/bolt.jpg", stored_photo.id)
    );
    let on_disk = state.storage.absolute_path(&stored_photo.relative_path);
    assert!(on_disk.is_file());
    assert_eq!(stored_photo.content_hash, Some(hash_file(&photo).unwrap()));
    assert_eq!(stored_photo.byte_size, std::fs::metadata(&photo).unwrap().len());

    let peak = measurements::load_measurement(&state.db, test.id, MeasurementKind::TesterPeak)
        .await
        .unwrap()
        .expect("tester peak recorded");
    assert!((peak.value_lbf - 50.0 * KN_TO_LBF).abs() < 1e-6);
    assert_eq!(peak.source_asset_id, Some(imported[1].id));

    let stored = assets::load_assets_for_test(&state.db, test.id).await.unwrap();
    assert_eq!(stored.len(), 2);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.event_type());
    }
    assert_eq!(
        kinds,
        vec!["ImportStarted", "ImportProgress", "ImportProgress", "ImportCompleted"]
    );
}

#[tokio::test]
async fn test_validation_failure_copies_nothing() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, None).await;

    let paths = vec![
        ctx.source_file("a.mov", b"a"),
        ctx.source_file("b.mov", b"b"),
        ctx.source_file("c.mp4", b"c"),
    ];
    let candidates = build_candidates(&paths, &[]).unwrap();

    let err = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::TooManyVideos { limit: 2 }));
    assert!(state.storage.list_files().unwrap().is_empty());
}

#[tokio::test]
async fn test_failure_mid_batch_keeps_prefix() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("T1")).await;

    let first = ctx.source_file("first.pdf", b"first");
    let second = ctx.source_file("second.pdf", b"second");
    let third = ctx.source_file("third.pdf", b"third");
    let candidates = build_candidates(&[first, second.clone(), third], &[]).unwrap();
    std::fs::remove_file(&second).unwrap();

    let mut events = state.event_bus.subscribe();
    let err = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::AssetNotReadable(_)));

    let stored = assets::load_assets_for_test(&state.db, test.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].filename, "first.pdf");
    assert_eq!(state.storage.list_files().unwrap().len(), 1);

    let mut failed = None;
    while let Ok(event) = events.try_recv() {
        if let MediaEvent::ImportFailed { imported, .. } = event {
            failed = Some(imported);
        }
    }
    assert_eq!(failed, Some(1));
}

#[tokio::test]
async fn test_video_roles_assigned_in_order() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("T2")).await;

    let first = build_candidates(&[ctx.source_file("anchor.mov", b"anchor")], &[]).unwrap();
    let imported = state
        .pipeline
        .import_candidates(&first, &test, &[])
        .await
        .unwrap();
    assert_eq!(imported[0].role, Some(VideoRole::AnchorView));

    let existing = assets::load_assets_for_test(&state.db, test.id).await.unwrap();
    let second = build_candidates(&[ctx.source_file("rig.m4v", b"rig")], &existing).unwrap();
    assert_eq!(second[0].role, Some(VideoRole::EquipmentView));

    let mut clash = second.clone();
    clash[0].select(None, Some(VideoRole::AnchorView));
    let err = state
        .pipeline
        .import_candidates(&clash, &test, &existing)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::DuplicateVideoRole(_)));
}

#[tokio::test]
async fn test_remove_asset_cleans_references() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("T3")).await;

    let paths = vec![
        ctx.source_file("anchor.mov", b"anchor"),
        ctx.source_file("run.lby", &tester_bytes()),
    ];
    let candidates = build_candidates(&paths, &[]).unwrap();
    let imported = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap();

    let mut config = sync::load_or_default(&state.db, test.id).await.unwrap();
    config.primary_asset_id = Some(imported[0].id);
    sync::save_sync_config(&state.db, &config).await.unwrap();

    state.pipeline.remove_asset(&imported[0]).await.unwrap();
    state.pipeline.remove_asset(&imported[1]).await.unwrap();

    let config = sync::load_or_default(&state.db, test.id).await.unwrap();
    assert_eq!(config.primary_asset_id, None);
    let peak = measurements::load_measurement(&state.db, test.id, MeasurementKind::TesterPeak)
        .await
        .unwrap();
    assert!(peak.is_none());
    assert!(state.storage.list_files().unwrap().is_empty());
    assert!(assets::load_assets_for_test(&state.db, test.id)
        .await
        .unwrap()
        .is_empty());
}

/// Reports every video as a 1920x1080 phone clip held sideways
struct SidewaysClipMetadata;

#[async_trait]
impl MetadataProbe for SidewaysClipMetadata {
    async fn probe(&self, path: &Path, kind: AssetKind) -> MediaResult<ProbedMetadata> {
        let video = (kind == AssetKind::Video).then(|| VideoMetadata {
            duration_seconds: Some(4.0),
            frame_rate: Some(30.0),
            pixel_width: Some(1920),
            pixel_height: Some(1080),
            orientation_turns: 1,
        });
        Ok(ProbedMetadata {
            byte_size: std::fs::metadata(path).unwrap().len(),
            content_type: Some("video/quicktime".to_string()),
            content_hash: hash_file(path).unwrap(),
            created_at: None,
            video,
        })
    }
}

#[tokio::test]
async fn test_rotated_video_renders_upright() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("T4")).await;
    let pipeline = AssetImportPipeline::new(
        state.db.clone(),
        state.storage.clone(),
        Arc::new(ImportPolicy::default()),
        Arc::new(SidewaysClipMetadata),
        state.event_bus.clone(),
    );

    let candidates = build_candidates(&[ctx.source_file("phone.mov", b"phone")], &[]).unwrap();
    let imported = pipeline.import_candidates(&candidates, &test, &[]).await.unwrap();

    let stored = assets::load_asset(&state.db, imported[0].id).await.unwrap().unwrap();
    assert_eq!(stored.orientation_turns, 1);

    let mut config = sync::load_or_default(&state.db, test.id).await.unwrap();
    config.set_trim(Some(0.0), Some(2.0)).unwrap();
    let plan = plan_composition(&test, &stored, None, &config, &[]).unwrap();
    assert!((plan.render_size.width - 1080.0).abs() < 1e-9);
    assert!((plan.render_size.height - 1920.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_flat_tester_file_clears_stale_peak() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("T5")).await;
    measurements::upsert_measurement(
        &state.db,
        &Measurement::tester_peak(test.id, 11240.0, Uuid::new_v4()),
    )
    .await
    .unwrap();

    let candidates = build_candidates(&[ctx.source_file("flat.lby", &[0u8; 1000])], &[]).unwrap();
    let imported = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap();
    assert_eq!(imported[0].kind, AssetKind::TesterBinary);

    let peak = measurements::load_measurement(&state.db, test.id, MeasurementKind::TesterPeak)
        .await
        .unwrap();
    assert!(peak.is_none());
}

#[tokio::test]
async fn test_shared_file_survives_until_last_reference() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let first = seed_test(state, Some("a")).await;
    let second = seed_test(state, Some("b")).await;

    let source = ctx.source_file("file.mov", b"same bytes in both tests");
    let candidates = build_candidates(&[source], &[]).unwrap();
    let in_first = state
        .pipeline
        .import_candidates(&candidates, &first, &[])
        .await
        .unwrap()
        .remove(0);
    state
        .pipeline
        .import_candidates(&candidates, &second, &[])
        .await
        .unwrap();

    let report = state.reconciler.reconcile(&state.db, &state.event_bus).await.unwrap();
    assert_eq!(report.deduplicated, 1);
    let shared = format!("a/{}/file.mov", in_first.id);
    assert_eq!(state.storage.list_files().unwrap(), vec![shared.clone()]);

    let in_second = assets::load_assets_for_test(&state.db, second.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(in_second.relative_path, shared);

    state.pipeline.remove_asset(&in_first).await.unwrap();
    assert!(state.storage.absolute_path(&shared).is_file());

    state.pipeline.remove_asset(&in_second).await.unwrap();
    assert!(!state.storage.absolute_path(&shared).exists());
}

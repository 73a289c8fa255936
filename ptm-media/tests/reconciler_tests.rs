//! Integrity reconciliation over real storage and database

mod helpers;

use helpers::{create_test_state, seed_test};
use ptm_common::db::assets;
use ptm_common::events::MediaEvent;
use ptm_media::services::{build_candidates, StorageManager};
use std::path::Path;

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

#[tokio::test]
async fn test_orphans_adopted_and_duplicates_collapsed() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test_a = seed_test(state, Some("a")).await;
    let test_b = seed_test(state, Some("b")).await;
    let media = ctx.media_root();

    write(&media, "a/x/file.mov", b"same bytes");
    write(&media, "b/y/file.mov", b"same bytes");
    write(&media, "a/z/notes.pdf", b"notes");
    write(&media, "nobody/w/stray.jpg", b"stray");

    let mut events = state.event_bus.subscribe();
    let report = state
        .reconciler
        .reconcile(&state.db, &state.event_bus)
        .await
        .unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(report.deduplicated, 1);
    assert_eq!(report.repointed, 1);
    assert_eq!(report.skipped_unmapped_files, 1);
    assert_eq!(report.hash_failures, 0);

    assert!(media.join("a/x/file.mov").is_file());
    assert!(!media.join("b").exists(), "emptied folders are pruned");

    let b_assets = assets::load_assets_for_test(&state.db, test_b.id).await.unwrap();
    assert_eq!(b_assets.len(), 1);
    assert_eq!(b_assets[0].relative_path, "a/x/file.mov");

    let a_assets = assets::load_assets_for_test(&state.db, test_a.id).await.unwrap();
    assert_eq!(a_assets.len(), 2);
    assert!(a_assets.iter().all(|a| a.content_hash.is_some()));

    assert!(matches!(
        events.try_recv(),
        Ok(MediaEvent::ReconcileCompleted { created: 3, .. })
    ));

    let second = state
        .reconciler
        .reconcile(&state.db, &state.event_bus)
        .await
        .unwrap();
    assert_eq!(second.total_changes(), 0, "{:?}", second);
    assert_eq!(second.skipped_unmapped_files, 1);
}

#[tokio::test]
async fn test_moved_file_is_relinked() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    let test = seed_test(state, Some("R1")).await;

    let source = ctx.source_file("sheet.pdf", b"signed test sheet");
    let candidates = build_candidates(&[source], &[]).unwrap();
    let imported = state
        .pipeline
        .import_candidates(&candidates, &test, &[])
        .await
        .unwrap();
    let original = imported[0].relative_path.clone();

    let media = ctx.media_root();
    write(&media, "R1/archive/sheet-renamed.pdf", b"signed test sheet");
    state.storage.remove_file(&original).unwrap();

    let report = state
        .reconciler
        .reconcile(&state.db, &state.event_bus)
        .await
        .unwrap();
    assert_eq!(report.relinked, 1);
    assert_eq!(report.created, 0);

    let relinked = assets::load_asset(&state.db, imported[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(relinked.relative_path, "R1/archive/sheet-renamed.pdf");
}

#[tokio::test]
async fn test_ambiguous_folder_left_alone() {
    let ctx = create_test_state().await;
    let state = &ctx.state;
    seed_test(state, Some("dup")).await;
    seed_test(state, Some("dup")).await;
    write(&ctx.media_root(), "dup/q/clip.mov", b"clip");

    let report = state
        .reconciler
        .reconcile(&state.db, &state.event_bus)
        .await
        .unwrap();
    assert_eq!(report.skipped_ambiguous_files, 1);
    assert_eq!(report.created, 0);
    assert!(ctx.media_root().join("dup/q/clip.mov").is_file());
    assert!(assets::load_all_assets(&state.db).await.unwrap().is_empty());
}

//! Database initialization against a real file

use ptm_common::db::{assets, init_database, measurements, pull_tests, sync};
use ptm_common::models::{AssetKind, MediaAsset, Measurement, MeasurementKind, PullTest, SyncConfiguration};
use tempfile::TempDir;
use uuid::Uuid;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_creates_database_and_schema() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("nested").join("ptm.db");

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables = table_names(&pool).await;
    for expected in ["measurements", "media_assets", "pull_tests", "sync_configurations"] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }

    let fk: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(fk, 1);
}

#[tokio::test]
async fn test_reopen_keeps_records() {
    let temp = TempDir::new().unwrap();
    let db_path = temp.path().join("ptm.db");
    let test = PullTest::new(Some("PT-7".to_string()));

    {
        let pool = init_database(&db_path).await.unwrap();
        pull_tests::save_test(&pool, &test).await.unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let loaded = pull_tests::load_test(&pool, test.id).await.unwrap().unwrap();
    assert_eq!(loaded.test_id.as_deref(), Some("PT-7"));
    assert_eq!(loaded.storage_key(), "PT-7");
}

#[tokio::test]
async fn test_deleting_test_cascades() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("ptm.db")).await.unwrap();

    let test = PullTest::new(None);
    pull_tests::save_test(&pool, &test).await.unwrap();

    let asset_id = Uuid::new_v4();
    let asset = MediaAsset::new(
        asset_id,
        test.id,
        AssetKind::TesterBinary,
        "run.lby",
        format!("{}/{}/run.lby", test.storage_key(), asset_id),
    );
    assets::insert_asset(&pool, &asset).await.unwrap();

    let mut config = SyncConfiguration::new(test.id);
    config.manual_offset_seconds = -0.4;
    sync::save_sync_config(&pool, &config).await.unwrap();
    measurements::upsert_measurement(&pool, &Measurement::tester_peak(test.id, 1234.5, asset_id))
        .await
        .unwrap();

    assert!(pull_tests::delete_test(&pool, test.id).await.unwrap());

    assert!(assets::load_asset(&pool, asset_id).await.unwrap().is_none());
    assert!(sync::load_sync_config(&pool, test.id).await.unwrap().is_none());
    assert!(
        measurements::load_measurement(&pool, test.id, MeasurementKind::TesterPeak)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_asset_requires_existing_test() {
    let temp = TempDir::new().unwrap();
    let pool = init_database(&temp.path().join("ptm.db")).await.unwrap();

    let orphan = MediaAsset::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        AssetKind::Photo,
        "a.jpg",
        "nowhere/a.jpg",
    );
    assert!(assets::insert_asset(&pool, &orphan).await.is_err());
}

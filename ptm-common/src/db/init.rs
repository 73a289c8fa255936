//! Database initialization
//!
//! Creates the database on first run and brings the schema up to date.
//! Every statement is idempotent, so startup against an existing database is
//! safe.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Open (creating if needed) the database file and initialize the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // WAL lets readers proceed while an import or reconcile commits
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Single connection: every SQLite in-memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_pull_tests_table(pool).await?;
    create_media_assets_table(pool).await?;
    create_sync_configurations_table(pool).await?;
    create_measurements_table(pool).await?;
    Ok(())
}

async fn create_pull_tests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pull_tests (
            id TEXT PRIMARY KEY,
            test_id TEXT,
            adhesive TEXT,
            anchor TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_media_assets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS media_assets (
            id TEXT PRIMARY KEY,
            test_id TEXT NOT NULL REFERENCES pull_tests(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            filename TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            created_at TEXT NOT NULL,
            byte_size INTEGER NOT NULL DEFAULT 0,
            content_type TEXT,
            content_hash TEXT,
            duration_seconds REAL,
            frame_rate REAL,
            pixel_width INTEGER,
            pixel_height INTEGER,
            orientation_turns INTEGER NOT NULL DEFAULT 0,
            role TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_assets_test ON media_assets(test_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_assets_path ON media_assets(relative_path)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_media_assets_hash ON media_assets(content_hash)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_sync_configurations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_configurations (
            test_id TEXT PRIMARY KEY REFERENCES pull_tests(id) ON DELETE CASCADE,
            primary_asset_id TEXT,
            equipment_asset_id TEXT,
            auto_offset_seconds REAL,
            auto_offset_confidence REAL,
            manual_offset_seconds REAL NOT NULL DEFAULT 0,
            trim_in_seconds REAL,
            trim_out_seconds REAL,
            tester_data_offset_seconds REAL NOT NULL DEFAULT 0,
            equipment_rotation INTEGER NOT NULL DEFAULT 0,
            crop_x REAL NOT NULL DEFAULT 0,
            crop_y REAL NOT NULL DEFAULT 0,
            crop_width REAL NOT NULL DEFAULT 1,
            crop_height REAL NOT NULL DEFAULT 1,
            last_synced_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_measurements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS measurements (
            test_id TEXT NOT NULL REFERENCES pull_tests(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            value_lbf REAL NOT NULL,
            source_asset_id TEXT,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (test_id, kind)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

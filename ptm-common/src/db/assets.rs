//! Media asset persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};
use crate::models::{AssetKind, MediaAsset, VideoRole};
use crate::Result;

const ASSET_COLUMNS: &str = "id, test_id, kind, filename, relative_path, created_at, byte_size, \
     content_type, content_hash, duration_seconds, frame_rate, pixel_width, pixel_height, \
     orientation_turns, role";

fn asset_from_row(row: &SqliteRow) -> Result<MediaAsset> {
    let id: String = row.get("id");
    let test_id: String = row.get("test_id");
    let kind: String = row.get("kind");
    let created_at: String = row.get("created_at");
    let byte_size: i64 = row.get("byte_size");
    let pixel_width: Option<i64> = row.get("pixel_width");
    let pixel_height: Option<i64> = row.get("pixel_height");
    let orientation_turns: i64 = row.get("orientation_turns");
    let role: Option<String> = row.get("role");

    Ok(MediaAsset {
        id: parse_uuid(&id)?,
        test_id: parse_uuid(&test_id)?,
        kind: kind.parse::<AssetKind>()?,
        filename: row.get("filename"),
        relative_path: row.get("relative_path"),
        created_at: parse_timestamp(&created_at)?,
        byte_size: byte_size.max(0) as u64,
        content_type: row.get("content_type"),
        content_hash: row.get("content_hash"),
        duration_seconds: row.get("duration_seconds"),
        frame_rate: row.get("frame_rate"),
        pixel_width: pixel_width.map(|w| w.max(0) as u32),
        pixel_height: pixel_height.map(|h| h.max(0) as u32),
        orientation_turns: orientation_turns.rem_euclid(4) as u8,
        role: role.as_deref().map(str::parse::<VideoRole>).transpose()?,
    })
}

/// Insert a new asset record
pub async fn insert_asset<'e>(executor: impl SqliteExecutor<'e>, asset: &MediaAsset) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO media_assets (
            id, test_id, kind, filename, relative_path, created_at, byte_size,
            content_type, content_hash, duration_seconds, frame_rate,
            pixel_width, pixel_height, orientation_turns, role
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(asset.id.to_string())
    .bind(asset.test_id.to_string())
    .bind(asset.kind.as_str())
    .bind(&asset.filename)
    .bind(&asset.relative_path)
    .bind(asset.created_at.to_rfc3339())
    .bind(asset.byte_size as i64)
    .bind(&asset.content_type)
    .bind(&asset.content_hash)
    .bind(asset.duration_seconds)
    .bind(asset.frame_rate)
    .bind(asset.pixel_width.map(i64::from))
    .bind(asset.pixel_height.map(i64::from))
    .bind(i64::from(asset.orientation_turns))
    .bind(asset.role.map(|r| r.as_str()))
    .execute(executor)
    .await?;

    Ok(())
}

/// Overwrite the mutable fields of an existing asset
pub async fn update_asset<'e>(executor: impl SqliteExecutor<'e>, asset: &MediaAsset) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE media_assets SET
            kind = ?,
            filename = ?,
            relative_path = ?,
            byte_size = ?,
            content_type = ?,
            content_hash = ?,
            duration_seconds = ?,
            frame_rate = ?,
            pixel_width = ?,
            pixel_height = ?,
            orientation_turns = ?,
            role = ?
        WHERE id = ?
        "#,
    )
    .bind(asset.kind.as_str())
    .bind(&asset.filename)
    .bind(&asset.relative_path)
    .bind(asset.byte_size as i64)
    .bind(&asset.content_type)
    .bind(&asset.content_hash)
    .bind(asset.duration_seconds)
    .bind(asset.frame_rate)
    .bind(asset.pixel_width.map(i64::from))
    .bind(asset.pixel_height.map(i64::from))
    .bind(i64::from(asset.orientation_turns))
    .bind(asset.role.map(|r| r.as_str()))
    .bind(asset.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn load_asset<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> Result<Option<MediaAsset>> {
    let sql = format!("SELECT {} FROM media_assets WHERE id = ?", ASSET_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(asset_from_row).transpose()
}

/// All assets of one test, oldest first
pub async fn load_assets_for_test<'e>(
    executor: impl SqliteExecutor<'e>,
    test_id: Uuid,
) -> Result<Vec<MediaAsset>> {
    let sql = format!(
        "SELECT {} FROM media_assets WHERE test_id = ? ORDER BY created_at, id",
        ASSET_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(test_id.to_string())
        .fetch_all(executor)
        .await?;

    rows.iter().map(asset_from_row).collect()
}

pub async fn load_all_assets<'e>(executor: impl SqliteExecutor<'e>) -> Result<Vec<MediaAsset>> {
    let sql = format!(
        "SELECT {} FROM media_assets ORDER BY relative_path, id",
        ASSET_COLUMNS
    );
    let rows = sqlx::query(&sql).fetch_all(executor).await?;

    rows.iter().map(asset_from_row).collect()
}

pub async fn delete_asset<'e>(executor: impl SqliteExecutor<'e>, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM media_assets WHERE id = ?")
        .bind(id.to_string())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of asset records pointing at a storage path
pub async fn count_path_references<'e>(
    executor: impl SqliteExecutor<'e>,
    relative_path: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM media_assets WHERE relative_path = ?")
        .bind(relative_path)
        .fetch_one(executor)
        .await?;

    Ok(count)
}

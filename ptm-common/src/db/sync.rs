//! Sync configuration persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::{parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::models::{NormalizedRect, SyncConfiguration};
use crate::Result;

fn sync_from_row(row: &SqliteRow) -> Result<SyncConfiguration> {
    let test_id: String = row.get("test_id");
    let last_synced_at: Option<String> = row.get("last_synced_at");
    let crop = NormalizedRect::new(
        row.get("crop_x"),
        row.get("crop_y"),
        row.get("crop_width"),
        row.get("crop_height"),
    );

    Ok(SyncConfiguration::from_parts(
        parse_uuid(&test_id)?,
        parse_optional_uuid(row.get("primary_asset_id"))?,
        parse_optional_uuid(row.get("equipment_asset_id"))?,
        row.get("auto_offset_seconds"),
        row.get("auto_offset_confidence"),
        row.get("manual_offset_seconds"),
        row.get("trim_in_seconds"),
        row.get("trim_out_seconds"),
        row.get("tester_data_offset_seconds"),
        row.get("equipment_rotation"),
        crop,
        last_synced_at.as_deref().map(parse_timestamp).transpose()?,
    ))
}

/// Stored configuration for a test, if one has been saved
pub async fn load_sync_config<'e>(
    executor: impl SqliteExecutor<'e>,
    test_id: Uuid,
) -> Result<Option<SyncConfiguration>> {
    let row = sqlx::query("SELECT * FROM sync_configurations WHERE test_id = ?")
        .bind(test_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(sync_from_row).transpose()
}

/// Stored configuration, or a fresh default one
pub async fn load_or_default<'e>(
    executor: impl SqliteExecutor<'e>,
    test_id: Uuid,
) -> Result<SyncConfiguration> {
    Ok(load_sync_config(executor, test_id)
        .await?
        .unwrap_or_else(|| SyncConfiguration::new(test_id)))
}

/// Insert or replace the configuration for its test
pub async fn save_sync_config<'e>(
    executor: impl SqliteExecutor<'e>,
    config: &SyncConfiguration,
) -> Result<()> {
    let crop = config.equipment_crop();

    sqlx::query(
        r#"
        INSERT INTO sync_configurations (
            test_id, primary_asset_id, equipment_asset_id,
            auto_offset_seconds, auto_offset_confidence, manual_offset_seconds,
            trim_in_seconds, trim_out_seconds, tester_data_offset_seconds,
            equipment_rotation, crop_x, crop_y, crop_width, crop_height, last_synced_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(test_id) DO UPDATE SET
            primary_asset_id = excluded.primary_asset_id,
            equipment_asset_id = excluded.equipment_asset_id,
            auto_offset_seconds = excluded.auto_offset_seconds,
            auto_offset_confidence = excluded.auto_offset_confidence,
            manual_offset_seconds = excluded.manual_offset_seconds,
            trim_in_seconds = excluded.trim_in_seconds,
            trim_out_seconds = excluded.trim_out_seconds,
            tester_data_offset_seconds = excluded.tester_data_offset_seconds,
            equipment_rotation = excluded.equipment_rotation,
            crop_x = excluded.crop_x,
            crop_y = excluded.crop_y,
            crop_width = excluded.crop_width,
            crop_height = excluded.crop_height,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(config.test_id.to_string())
    .bind(config.primary_asset_id.map(|id| id.to_string()))
    .bind(config.equipment_asset_id.map(|id| id.to_string()))
    .bind(config.auto_offset_seconds)
    .bind(config.auto_offset_confidence)
    .bind(config.manual_offset_seconds)
    .bind(config.trim_in_seconds)
    .bind(config.trim_out_seconds)
    .bind(config.tester_data_offset_seconds)
    .bind(i64::from(config.equipment_rotation()))
    .bind(crop.x)
    .bind(crop.y)
    .bind(crop.width)
    .bind(crop.height)
    .bind(config.last_synced_at.map(|t| t.to_rfc3339()))
    .execute(executor)
    .await?;

    Ok(())
}

//! Test measurement persistence

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::{parse_optional_uuid, parse_timestamp, parse_uuid};
use crate::models::{Measurement, MeasurementKind};
use crate::Result;

fn measurement_from_row(row: &SqliteRow) -> Result<Measurement> {
    let test_id: String = row.get("test_id");
    let kind: String = row.get("kind");
    let recorded_at: String = row.get("recorded_at");

    Ok(Measurement {
        test_id: parse_uuid(&test_id)?,
        kind: kind.parse::<MeasurementKind>()?,
        value_lbf: row.get("value_lbf"),
        source_asset_id: parse_optional_uuid(row.get("source_asset_id"))?,
        recorded_at: parse_timestamp(&recorded_at)?,
    })
}

/// Insert or replace the measurement of this kind for the test
pub async fn upsert_measurement<'e>(
    executor: impl SqliteExecutor<'e>,
    measurement: &Measurement,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO measurements (test_id, kind, value_lbf, source_asset_id, recorded_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(test_id, kind) DO UPDATE SET
            value_lbf = excluded.value_lbf,
            source_asset_id = excluded.source_asset_id,
            recorded_at = excluded.recorded_at
        "#,
    )
    .bind(measurement.test_id.to_string())
    .bind(measurement.kind.as_str())
    .bind(measurement.value_lbf)
    .bind(measurement.source_asset_id.map(|id| id.to_string()))
    .bind(measurement.recorded_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn remove_measurement<'e>(
    executor: impl SqliteExecutor<'e>,
    test_id: Uuid,
    kind: MeasurementKind,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM measurements WHERE test_id = ? AND kind = ?")
        .bind(test_id.to_string())
        .bind(kind.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn load_measurement<'e>(
    executor: impl SqliteExecutor<'e>,
    test_id: Uuid,
    kind: MeasurementKind,
) -> Result<Option<Measurement>> {
    let row = sqlx::query(
        "SELECT test_id, kind, value_lbf, source_asset_id, recorded_at FROM measurements WHERE test_id = ? AND kind = ?",
    )
    .bind(test_id.to_string())
    .bind(kind.as_str())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(measurement_from_row).transpose()
}

//! Per-test synchronisation settings between the two camera angles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Bring any number of clockwise quarter turns into 0..=3
pub fn normalize_quarter_turns(turns: i64) -> u8 {
    turns.rem_euclid(4) as u8
}

/// Rectangle in unit coordinates (0..1 on both axes, origin top-left)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    /// Smallest allowed width or height
    pub const MIN_DIMENSION: f64 = 0.05;

    pub const FULL: NormalizedRect = NormalizedRect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Clamp into the unit square
    ///
    /// Each dimension is forced into `MIN_DIMENSION..=1`; the origin is then
    /// shifted so the rectangle does not cross the far edge. Non-finite
    /// components fall back to the full-frame value.
    pub fn clamped(&self) -> Self {
        let finite_or = |v: f64, fallback: f64| if v.is_finite() { v } else { fallback };

        let width = finite_or(self.width, 1.0).clamp(Self::MIN_DIMENSION, 1.0);
        let height = finite_or(self.height, 1.0).clamp(Self::MIN_DIMENSION, 1.0);
        let x = finite_or(self.x, 0.0).clamp(0.0, 1.0 - width);
        let y = finite_or(self.y, 0.0).clamp(0.0, 1.0 - height);

        Self {
            x,
            y,
            width,
            height,
        }
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Sync configuration; exactly one per test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfiguration {
    pub test_id: Uuid,
    pub primary_asset_id: Option<Uuid>,
    pub equipment_asset_id: Option<Uuid>,
    /// Offset suggested by the audio estimator (equipment minus primary)
    pub auto_offset_seconds: Option<f64>,
    pub auto_offset_confidence: Option<f64>,
    pub manual_offset_seconds: f64,
    pub trim_in_seconds: Option<f64>,
    pub trim_out_seconds: Option<f64>,
    pub tester_data_offset_seconds: f64,
    equipment_rotation: u8,
    equipment_crop: NormalizedRect,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncConfiguration {
    pub fn new(test_id: Uuid) -> Self {
        Self {
            test_id,
            primary_asset_id: None,
            equipment_asset_id: None,
            auto_offset_seconds: None,
            auto_offset_confidence: None,
            manual_offset_seconds: 0.0,
            trim_in_seconds: None,
            trim_out_seconds: None,
            tester_data_offset_seconds: 0.0,
            equipment_rotation: 0,
            equipment_crop: NormalizedRect::FULL,
            last_synced_at: None,
        }
    }

    /// Auto-detected plus manual offset
    pub fn effective_offset(&self) -> f64 {
        self.auto_offset_seconds.unwrap_or(0.0) + self.manual_offset_seconds
    }

    /// Equipment rotation in clockwise quarter turns, always 0..=3
    pub fn equipment_rotation(&self) -> u8 {
        self.equipment_rotation
    }

    pub fn set_equipment_rotation(&mut self, turns: i64) {
        self.equipment_rotation = normalize_quarter_turns(turns);
    }

    /// Rotate the equipment view a further quarter turn clockwise
    pub fn rotate_equipment_clockwise(&mut self) {
        self.set_equipment_rotation(self.equipment_rotation as i64 + 1);
    }

    pub fn equipment_crop(&self) -> NormalizedRect {
        self.equipment_crop
    }

    pub fn set_equipment_crop(&mut self, crop: NormalizedRect) {
        self.equipment_crop = crop.clamped();
    }

    /// Set both trim points; trim-out may not precede trim-in
    pub fn set_trim(&mut self, trim_in: Option<f64>, trim_out: Option<f64>) -> Result<()> {
        for value in [trim_in, trim_out].into_iter().flatten() {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "Trim point must be a non-negative number, got {}",
                    value
                )));
            }
        }
        if let (Some(tin), Some(tout)) = (trim_in, trim_out) {
            if tout < tin {
                return Err(Error::InvalidInput(format!(
                    "Trim-out ({:.3}s) precedes trim-in ({:.3}s)",
                    tout, tin
                )));
            }
        }
        self.trim_in_seconds = trim_in;
        self.trim_out_seconds = trim_out;
        Ok(())
    }

    /// Record an automatic estimate
    pub fn apply_auto_offset(&mut self, offset_seconds: f64, confidence: f64) {
        self.auto_offset_seconds = Some(offset_seconds);
        self.auto_offset_confidence = Some(confidence);
        self.last_synced_at = Some(Utc::now());
    }

    /// Rebuild from stored columns, re-applying the normalisation rules
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        test_id: Uuid,
        primary_asset_id: Option<Uuid>,
        equipment_asset_id: Option<Uuid>,
        auto_offset_seconds: Option<f64>,
        auto_offset_confidence: Option<f64>,
        manual_offset_seconds: f64,
        trim_in_seconds: Option<f64>,
        trim_out_seconds: Option<f64>,
        tester_data_offset_seconds: f64,
        equipment_rotation: i64,
        equipment_crop: NormalizedRect,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut config = Self {
            test_id,
            primary_asset_id,
            equipment_asset_id,
            auto_offset_seconds,
            auto_offset_confidence,
            manual_offset_seconds,
            trim_in_seconds,
            trim_out_seconds,
            tester_data_offset_seconds,
            equipment_rotation: 0,
            equipment_crop: NormalizedRect::FULL,
            last_synced_at,
        };
        config.set_equipment_rotation(equipment_rotation);
        config.set_equipment_crop(equipment_crop);
        config
    }
}

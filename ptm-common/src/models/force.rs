//! Force samples and derived measurements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Kilonewtons to pounds-force
pub const KN_TO_LBF: f64 = 224.80894387096;

/// One reading from the pull tester
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceSample {
    pub time_seconds: f64,
    /// Force in kN
    pub force_kn: f64,
}

impl ForceSample {
    pub fn new(time_seconds: f64, force_kn: f64) -> Self {
        Self {
            time_seconds,
            force_kn,
        }
    }

    /// Force in pounds-force
    pub fn force_lbs(&self) -> f64 {
        self.force_kn * KN_TO_LBF
    }
}

/// Kind of measurement recorded against a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    /// Peak force extracted from the test's tester binary file
    TesterPeak,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::TesterPeak => "tester_peak",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tester_peak" => Ok(MeasurementKind::TesterPeak),
            other => Err(Error::InvalidInput(format!(
                "Unknown measurement kind: {}",
                other
            ))),
        }
    }
}

/// A measurement on a test; at most one per (test, kind)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub test_id: Uuid,
    pub kind: MeasurementKind,
    /// Value in pounds-force
    pub value_lbf: f64,
    pub source_asset_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

impl Measurement {
    pub fn tester_peak(test_id: Uuid, value_lbf: f64, source_asset_id: Uuid) -> Self {
        Self {
            test_id,
            kind: MeasurementKind::TesterPeak,
            value_lbf,
            source_asset_id: Some(source_asset_id),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_conversion() {
        let sample = ForceSample::new(0.5, 10.0);
        assert!((sample.force_lbs() - 2248.0894387096).abs() < 1e-9);
    }

    #[test]
    fn test_measurement_kind_parse() {
        assert_eq!(
            "tester_peak".parse::<MeasurementKind>().unwrap(),
            MeasurementKind::TesterPeak
        );
        assert!("peak".parse::<MeasurementKind>().is_err());
    }
}

//! Domain records shared between the media service and the record store

pub mod asset;
pub mod force;
pub mod sync;

pub use asset::{AssetKind, MediaAsset, VideoRole};
pub use force::{ForceSample, Measurement, MeasurementKind, KN_TO_LBF};
pub use pull_test::{sanitize_storage_key, PullTest};
pub use sync::{normalize_quarter_turns, NormalizedRect, SyncConfiguration};

//! Service modules for the pull-test media core
//!
//! Each capability with a platform-specific side sits behind a trait
//! (`StorageManager`, `ImportValidator`, `MetadataProbe`, `SyncEstimator`,
//! `PlatformEncoder`) with one default implementation here.

pub mod audio_offset_estimator;
pub mod composition_planner;
pub mod content_hasher;
pub mod exporter;
pub mod geometry_resolver;
pub mod import_pipeline;
pub mod import_validator;
pub mod integrity_reconciler;
pub mod metadata_probe;
pub mod storage_manager;
pub mod tester_binary;

pub use audio_offset_estimator::{estimate_offset, EnvelopeSyncEstimator, SyncEstimator};
pub use composition_planner::{plan_composition, TrimWindow};
pub use content_hasher::hash_file;
pub use exporter::{ExportService, PlanManifestEncoder, PlatformEncoder};
pub use geometry_resolver::placed_transform;
pub use import_pipeline::{build_candidates, AssetImportPipeline};
pub use import_validator::{ImportPolicy, ImportValidator};
pub use integrity_reconciler::{MediaIntegrityReconciler, ScannedFile};
pub use metadata_probe::{FileMetadataProbe, MetadataProbe, ProbedMetadata};
pub use storage_manager::{ManagedStorage, StorageManager};

//! ptm-media library interface
//!
//! Exposes the media core (offset estimation, geometry, composition,
//! tester decoding, import, reconciliation, export) and the HTTP service
//! state for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult, MediaError, MediaResult};

use axum::Router;
use chrono::{DateTime, Utc};
use ptm_common::config::RootFolder;
use ptm_common::events::EventBus;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::services::{
    AssetImportPipeline, EnvelopeSyncEstimator, ExportService, FileMetadataProbe, ImportPolicy,
    ManagedStorage, MediaIntegrityReconciler, PlanManifestEncoder, StorageManager, SyncEstimator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub root: RootFolder,
    pub storage: Arc<dyn StorageManager>,
    pub pipeline: AssetImportPipeline,
    pub estimator: Arc<dyn SyncEstimator>,
    pub reconciler: MediaIntegrityReconciler,
    pub exporter: ExportService,
    /// Cancellation tokens for running offset estimates, keyed by test id
    pub cancellation_tokens: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    /// Per-test import serialisation
    import_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
    /// Held shared by storage writers, exclusively by reconciliation
    pub storage_guard: Arc<RwLock<()>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last background error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// State wired to the default service implementations
    pub fn new(db: SqlitePool, event_bus: EventBus, root: RootFolder) -> Self {
        let storage: Arc<dyn StorageManager> = Arc::new(ManagedStorage::new(root.media_root()));
        let pipeline = AssetImportPipeline::new(
            db.clone(),
            Arc::clone(&storage),
            Arc::new(ImportPolicy::default()),
            Arc::new(FileMetadataProbe),
            event_bus.clone(),
        );

        Self {
            reconciler: MediaIntegrityReconciler::new(Arc::clone(&storage)),
            exporter: ExportService::new(Arc::clone(&storage), Arc::new(PlanManifestEncoder)),
            estimator: Arc::new(EnvelopeSyncEstimator::new()),
            pipeline,
            storage,
            db,
            event_bus,
            root,
            cancellation_tokens: Arc::new(RwLock::new(HashMap::new())),
            import_locks: Arc::new(Mutex::new(HashMap::new())),
            storage_guard: Arc::new(RwLock::new(())),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the offset estimator
    pub fn with_estimator(mut self, estimator: Arc<dyn SyncEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Mutex serialising imports and removals for one test
    ///
    /// Entries nobody holds are dropped on the way in, so the map only keeps
    /// tests with an operation in flight.
    pub async fn import_lock(&self, test_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.import_locks.lock().await;
        locks.retain(|id, lock| *id == test_id || Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(test_id).or_default())
    }

    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::test_routes())
        .merge(api::asset_routes())
        .merge(api::sync_routes())
        .merge(api::composition_routes())
        .merge(api::maintenance_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let root = RootFolder::new(dir.path());
        root.ensure_exists().unwrap();
        let db = ptm_common::db::init_memory_database().await.unwrap();
        (dir, AppState::new(db, EventBus::new(8), root))
    }

    #[tokio::test]
    async fn test_import_lock_shared_per_test() {
        let (_dir, state) = test_state().await;
        let id = Uuid::new_v4();

        let first = state.import_lock(id).await;
        let second = state.import_lock(id).await;
        assert!(Arc::ptr_eq(&first, &second));

        let _held = first.lock().await;
        assert!(second.try_lock().is_err());
    }

    #[tokio::test]
    async fn test_released_import_locks_are_dropped() {
        let (_dir, state) = test_state().await;
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let held = state.import_lock(a).await;
        drop(state.import_lock(b).await);
        drop(state.import_lock(Uuid::new_v4()).await);

        let locks = state.import_locks.lock().await;
        assert_eq!(locks.len(), 2, "held entry plus the latest one");
        assert!(locks.contains_key(&a));
        drop(locks);
        drop(held);

        state.import_lock(b).await;
        let locks = state.import_locks.lock().await;
        assert_eq!(locks.len(), 1);
        assert!(locks.contains_key(&b));
    }
}

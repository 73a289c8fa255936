//! Application state over a temporary root folder

use axum::body::Body;
use http_body_util::BodyExt;
use ptm_common::config::RootFolder;
use ptm_common::db::{pull_tests, sync};
use ptm_common::events::EventBus;
use ptm_common::models::{PullTest, SyncConfiguration};
use tempfile::TempDir;

use ptm_media::AppState;

/// State plus the directories it lives in
///
/// Keep the context alive for the whole test; dropping it removes the root.
pub struct TestContext {
    pub root_dir: TempDir,
    /// Scratch space for import sources
    pub source_dir: TempDir,
    pub state: AppState,
}

impl TestContext {
    pub fn media_root(&self) -> std::path::PathBuf {
        self.state.root.media_root()
    }

    /// Write a source file to import
    pub fn source_file(&self, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = self.source_dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }
}

/// File-backed database and managed storage in a fresh temp directory
pub async fn create_test_state() -> TestContext {
    let root_dir = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();
    let root = RootFolder::new(root_dir.path());
    root.ensure_exists().unwrap();

    let db = ptm_common::db::init_database(&root.database_path())
        .await
        .unwrap();
    let state = AppState::new(db, EventBus::new(64), root);

    TestContext {
        root_dir,
        source_dir,
        state,
    }
}

/// Insert a test record with its default sync configuration
pub async fn seed_test(state: &AppState, human_id: Option<&str>) -> PullTest {
    let mut test = PullTest::new(human_id.map(str::to_string));
    test.adhesive = Some("HY200-V3".to_string());
    test.anchor = Some("M12".to_string());
    pull_tests::save_test(&state.db, &test).await.unwrap();
    sync::save_sync_config(&state.db, &SyncConfiguration::new(test.id))
        .await
        .unwrap();
    test
}

pub async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

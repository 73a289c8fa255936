//! HTTP API handlers for ptm-media
//!
//! JSON over HTTP plus an SSE stream of [`MediaEvent`](ptm_common::events::MediaEvent)s.

pub mod assets;
pub mod composition;
pub mod health;
pub mod maintenance;
pub mod sse;
pub mod sync;

pub use assets::asset_routes;
pub use composition::composition_routes;
pub use health::health_routes;
pub use maintenance::maintenance_routes;
pub use pull_tests::test_routes;
pub use sse::event_routes;
pub use sync::sync_routes;

use ptm_common::db;
use ptm_common::models::PullTest;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Load a test or answer 404
pub(crate) async fn require_test(state: &AppState, test_id: Uuid) -> ApiResult<PullTest> {
    db::pull_tests::load_test(&state.db, test_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Test not found: {}", test_id)))
}

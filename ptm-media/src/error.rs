//! Error types for ptm-media
//!
//! `MediaError` is the domain taxonomy raised by the services; `ApiError`
//! wraps it (and lower-level errors) for HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the media core
#[derive(Debug, Error)]
pub enum MediaError {
    /// Video extension outside the accepted container list
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("File too large: {path} is {size} bytes (max {limit})")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Too many videos: a test may hold at most {limit}")]
    TooManyVideos { limit: usize },

    #[error("Video role {0} is already held by another video")]
    DuplicateVideoRole(String),

    #[error("Too many tester files: a test may hold at most {limit}")]
    TooManyTesterFiles { limit: usize },

    #[error("Trim-in and trim-out must both be set")]
    TrimRangeRequired,

    #[error("Invalid trim range: trim-out ({trim_out:.3}s) must exceed trim-in ({trim_in:.3}s)")]
    InvalidTrimRange { trim_in: f64, trim_out: f64 },

    #[error("Asset not readable: {0}")]
    AssetNotReadable(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// Per-file hashing failure; counted by the reconciler, not raised by it
    #[error("Hash failure for {path}: {reason}")]
    HashFailure { path: PathBuf, reason: String },

    /// Orphan file matching several tests; counted, never auto-resolved
    #[error("Ambiguous match for {0}")]
    AmbiguousMatch(String),

    /// Caller cancelled a background operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Managed storage I/O failure
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] ptm_common::Error),
}

/// Result type for media core operations
pub type MediaResult<T> = Result<T, MediaError>;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409) - e.g. an estimate already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Common error: {0}")]
    Common(#[from] ptm_common::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Media(err) => match err {
                MediaError::UnsupportedFileType(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "UNSUPPORTED_FILE_TYPE")
                }
                MediaError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
                MediaError::TooManyVideos { .. } => (StatusCode::CONFLICT, "TOO_MANY_VIDEOS"),
                MediaError::DuplicateVideoRole(_) => (StatusCode::CONFLICT, "DUPLICATE_VIDEO_ROLE"),
                MediaError::TooManyTesterFiles { .. } => {
                    (StatusCode::CONFLICT, "TOO_MANY_TESTER_FILES")
                }
                MediaError::TrimRangeRequired => (StatusCode::BAD_REQUEST, "TRIM_RANGE_REQUIRED"),
                MediaError::InvalidTrimRange { .. } => (StatusCode::BAD_REQUEST, "INVALID_TRIM_RANGE"),
                MediaError::AssetNotReadable(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "ASSET_NOT_READABLE")
                }
                MediaError::ExportFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "EXPORT_FAILED"),
                MediaError::HashFailure { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "HASH_FAILURE"),
                MediaError::AmbiguousMatch(_) => (StatusCode::CONFLICT, "AMBIGUOUS_MATCH"),
                MediaError::Cancelled => (StatusCode::CONFLICT, "CANCELLED"),
                MediaError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
                MediaError::Common(inner) => common_status(inner),
            },
            ApiError::Common(inner) => common_status(inner),
        }
    }
}

fn common_status(err: &ptm_common::Error) -> (StatusCode, &'static str) {
    match err {
        ptm_common::Error::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        ptm_common::Error::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code = error_code, error = %message, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

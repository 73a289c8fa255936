//! Database schema and queries for the pull-test record store

pub mod assets;
pub mod init;
pub mod measurements;
pub mod sync;

pub use init::{create_schema, init_database, init_memory_database};

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Parse a UUID stored as TEXT
pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))
}

pub(crate) fn parse_optional_uuid(raw: Option<String>) -> Result<Option<Uuid>> {
    raw.as_deref().map(parse_uuid).transpose()
}

/// Parse an RFC 3339 timestamp stored as TEXT
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))
}

//! Errors raised by the record store, configuration and root folder layer
//!
//! Media services wrap these in their own error type; nothing here knows
//! about files being imported or rendered.

use thiserror::Error;

/// Result of a store or configuration operation
pub type Result<T> = std::result::Result<T, Error>;

/// Failure in `ptm-common`
#[derive(Error, Debug)]
pub enum Error {
    /// Query, transaction or connection failure
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Root folder or database file could not be created or read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable or malformed `config.toml`
    #[error("Configuration error: {0}")]
    Config(String),

    /// No test, asset or configuration with the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rejected value, e.g. an empty trim range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Stored data that cannot be parsed back, or a background task that died
    #[error("Internal error: {0}")]
    Internal(String),
}

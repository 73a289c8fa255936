//! # PTM Common Library
//!
//! Shared code for the pull-test media services:
//! - Domain records (tests, media assets, sync configuration, force samples)
//! - Database schema and queries
//! - Event types and the broadcast event bus
//! - Configuration loading and root folder resolution

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};

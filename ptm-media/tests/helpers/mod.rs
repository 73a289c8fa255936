//! Test helper utilities
//!
//! Shared utilities for testing ptm-media

#![allow(dead_code)]

pub mod audio_generator;
pub mod state;

pub use audio_generator::{generate_clap_wav, ClapConfig};
pub use state::{body_json, create_test_state, seed_test, TestContext};

//! Configuration loading and root folder resolution
//!
//! Tests that touch PTM_ROOT_FOLDER are marked #[serial] so they do not race
//! on the process environment.

use ptm_common::config::{
    default_root_folder, resolve_root_folder, RootFolder, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let toml = TomlConfig {
        root_folder: Some(PathBuf::from("/from/toml")),
        ..Default::default()
    };

    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &toml);
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/env"));
}

#[test]
#[serial]
fn test_cli_beats_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/from/env");
    let resolved = resolve_root_folder(
        Some(Path::new("/from/cli")),
        ROOT_FOLDER_ENV,
        &TomlConfig::default(),
    );
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, PathBuf::from("/from/cli"));
}

#[test]
#[serial]
fn test_blank_env_var_ignored() {
    env::set_var(ROOT_FOLDER_ENV, "   ");
    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    env::remove_var(ROOT_FOLDER_ENV);

    assert_eq!(resolved, default_root_folder());
}

#[test]
#[serial]
fn test_falls_back_to_default() {
    env::remove_var(ROOT_FOLDER_ENV);
    let resolved = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert_eq!(resolved, default_root_folder());
    assert!(!resolved.as_os_str().is_empty());
}

#[test]
fn test_load_full_toml_file() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
root_folder = "/srv/ptm"
bind_address = "0.0.0.0"
port = 5781

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/srv/ptm")));
    assert_eq!(config.bind_address.as_deref(), Some("0.0.0.0"));
    assert_eq!(config.port, Some(5781));
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "port = \"not a number").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(matches!(err, ptm_common::Error::Config(_)));
}

#[test]
fn test_missing_file_is_config_error() {
    let temp = tempfile::TempDir::new().unwrap();
    let err = TomlConfig::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn test_ensure_exists_is_idempotent() {
    let temp = tempfile::TempDir::new().unwrap();
    let root = RootFolder::new(temp.path().join("ptm"));

    root.ensure_exists().unwrap();
    std::fs::write(root.media_root().join("keep.txt"), b"x").unwrap();
    root.ensure_exists().unwrap();

    assert!(root.media_root().join("keep.txt").is_file());
    assert_eq!(root.path(), temp.path().join("ptm"));
}

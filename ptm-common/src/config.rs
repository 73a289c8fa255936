//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PTM_ROOT_FOLDER";

/// Sub-folder of the root folder holding managed media
pub const MEDIA_FOLDER: &str = "media";

/// Database file name inside the root folder
pub const DATABASE_FILENAME: &str = "ptm.db";

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Contents of `config.toml`
///
/// Every field is optional; a missing or unreadable file is never fatal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the first config file found on this platform, or defaults
    pub fn load_or_default() -> Self {
        match find_config_file() {
            Some(path) => match Self::load(&path) {
                Ok(config) => {
                    info!("Loaded config file: {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("{} - using defaults", e);
                    Self::default()
                }
            },
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }
}

/// Locate the config file: user config dir first, then `/etc/ptm` on Linux
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ptm").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/ptm/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution in priority order:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("ptm"))
        .unwrap_or_else(|| PathBuf::from("./ptm_data"))
}

/// Paths derived from the root folder
///
/// Passed explicitly into every component that touches storage, so tests can
/// point the whole service at a temporary directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootFolder {
    root: PathBuf,
}

impl RootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Root of managed media storage
    pub fn media_root(&self) -> PathBuf {
        self.root.join(MEDIA_FOLDER)
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILENAME)
    }

    /// Create the root and media folders if missing
    pub fn ensure_exists(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating root folder: {}", self.root.display());
        }
        std::fs::create_dir_all(self.media_root())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_argument_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "PTM_TEST_UNUSED_ROOT_VAR",
            &toml,
        );
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    fn test_toml_used_when_no_cli_or_env() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(None, "PTM_TEST_UNSET_ROOT_VAR", &toml);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config: TomlConfig = toml::from_str("port = 6100\n").unwrap();
        assert_eq!(config.port, Some(6100));
        assert_eq!(config.logging.level, "info");
        assert!(config.root_folder.is_none());
    }

    #[test]
    fn test_root_folder_layout() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = RootFolder::new(temp.path().join("nested"));
        root.ensure_exists().unwrap();
        assert!(root.media_root().is_dir());
        assert_eq!(root.database_path(), temp.path().join("nested").join("ptm.db"));
    }
}

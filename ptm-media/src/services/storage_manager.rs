//! Managed storage
//!
//! Every stored file lives at `{root}/{testStorageKey}/{assetId}/{filename}`.
//! Paths handed around the service are relative to the root and always use
//! `/` separators, so records stay portable between machines.

use ptm_common::models::PullTest;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

/// Capability: file operations inside the managed root
pub trait StorageManager: Send + Sync {
    fn root(&self) -> &Path;

    /// Relative path for a new asset's file
    fn asset_path(&self, test: &PullTest, asset_id: Uuid, filename: &str) -> String {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| asset_id.to_string());
        format!("{}/{}/{}", test.storage_key(), asset_id, name)
    }

    fn absolute_path(&self, relative: &str) -> PathBuf {
        relative
            .split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root().to_path_buf(), |path, part| path.join(part))
    }

    fn exists(&self, relative: &str) -> bool {
        self.absolute_path(relative).is_file()
    }

    /// Copy `source` into the store; returns the bytes written
    fn store_copy(&self, source: &Path, relative: &str) -> io::Result<u64>;

    /// Create the parent directory of `relative` and return its absolute path
    fn prepare_path(&self, relative: &str) -> io::Result<PathBuf>;

    /// Delete a stored file and prune directories it leaves empty
    ///
    /// Returns `false` when the file was already gone.
    fn remove_file(&self, relative: &str) -> io::Result<bool>;

    /// Relative paths of all regular files, sorted
    fn list_files(&self) -> io::Result<Vec<String>>;
}

/// Convert a path under `root` to the `/`-separated relative form
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn reject_escape(relative: &str) -> io::Result<()> {
    if relative.split('/').any(|part| part == ".." || part == ".") || relative.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Path escapes managed storage: {}", relative),
        ));
    }
    Ok(())
}

/// Default storage rooted at a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct ManagedStorage {
    root: PathBuf,
}

impl ManagedStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn prune_empty_parents(&self, from: &Path) {
        let mut current = from.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            let is_empty = fs::read_dir(dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty || fs::remove_dir(dir).is_err() {
                break;
            }
            tracing::debug!(dir = %dir.display(), "Pruned empty directory");
            current = dir.parent();
        }
    }
}

impl StorageManager for ManagedStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn store_copy(&self, source: &Path, relative: &str) -> io::Result<u64> {
        let destination = self.prepare_path(relative)?;
        match fs::copy(source, &destination) {
            Ok(bytes) => {
                tracing::debug!(
                    source = %source.display(),
                    destination = %destination.display(),
                    bytes = bytes,
                    "Stored file"
                );
                Ok(bytes)
            }
            Err(e) => {
                if destination.exists() {
                    let _ = fs::remove_file(&destination);
                }
                self.prune_empty_parents(&destination);
                Err(e)
            }
        }
    }

    fn prepare_path(&self, relative: &str) -> io::Result<PathBuf> {
        reject_escape(relative)?;
        let path = self.absolute_path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn remove_file(&self, relative: &str) -> io::Result<bool> {
        reject_escape(relative)?;
        let path = self.absolute_path(relative);
        if !path.exists() {
            return Ok(false);
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        }
        self.prune_empty_parents(&path);
        Ok(true)
    }

    fn list_files(&self) -> io::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(key) = relative_key(&self.root, entry.path()) {
                        files.push(key);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Error accessing storage entry");
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{BlobStore, check_key};
use crate::error::{CaError, Result};

/// Blobs as files in one directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// reader never sees a half-written blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CaError::storage(format!("cannot read {}", path.display()), e)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key)?;
        std::fs::create_dir_all(&self.root).map_err(|e| {
            CaError::storage(format!("cannot create {}", self.root.display()), e)
        })?;
        let staging = self.root.join(format!(".{key}.tmp"));
        std::fs::write(&staging, bytes)
            .and_then(|()| std::fs::rename(&staging, &path))
            .map_err(|e| CaError::storage(format!("cannot write {}", path.display()), e))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let path = self.path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CaError::storage(format!("cannot delete {}", path.display()), e)),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CaError::storage(
                    format!("cannot list {}", self.root.display()),
                    e,
                ));
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                CaError::storage(format!("cannot list {}", self.root.display()), e)
            })?;
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

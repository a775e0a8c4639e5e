//! File-backed storage adapter

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{check_capacity, StorageAdapter};
use crate::utils::safe_filename;

/// Stores each key as a JSON file inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    capacity: usize,
}

impl FileStorage {
    /// Create a file store rooted at `dir`; `capacity` of 0 means unbounded
    pub fn new<P: AsRef<Path>>(dir: P, capacity: usize) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            capacity,
        }
    }

    /// Directory holding the blobs
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_filename(key)))
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        let path = self.blob_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        String::from_utf8(bytes).map(Some).map_err(|e| {
            warn!("Blob {} is not valid UTF-8", path.display());
            crate::Error::Serialization(format!("'{}' is not valid UTF-8: {}", key, e))
        })
    }

    fn set(&self, key: &str, blob: &str) -> crate::Result<()> {
        check_capacity(key, blob, self.capacity)?;

        let write = || -> std::io::Result<()> {
            std::fs::create_dir_all(&self.dir)?;
            let path = self.blob_path(key);
            // Write-then-rename so readers never observe a partial blob.
            let tmp = path.with_extension("json.tmp");
            std::fs::write(&tmp, blob)?;
            std::fs::rename(&tmp, &path)
        };
        write().map_err(|e| crate::Error::Storage(format!("failed to write '{}': {}", key, e)))?;

        debug!("Wrote {} bytes to {}", blob.len(), self.blob_path(key).display());
        Ok(())
    }
}

//! In-process storage adapter

use parking_lot::Mutex;
use std::collections::HashMap;

use super::{check_capacity, StorageAdapter};

/// Storage adapter that keeps blobs in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: Mutex<HashMap<String, String>>,
    capacity: usize,
}

impl MemoryStorage {
    /// Create an unbounded memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory store that rejects blobs larger than `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            capacity,
        }
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> crate::Result<Option<String>> {
        Ok(self.blobs.lock().get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> crate::Result<()> {
        check_capacity(key, blob, self.capacity)?;
        self.blobs.lock().insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

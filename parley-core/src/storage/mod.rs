//! Storage adapters
//!
//! A storage adapter is a durable key to blob store with synchronous reads
//! and writes. The session store keeps its whole collection under a single
//! key and rewrites it after every mutation.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Durable key/blob store backing the session store
pub trait StorageAdapter: Send + Sync {
    /// Read the blob stored under `key`
    fn get(&self, key: &str) -> crate::Result<Option<String>>;

    /// Replace the blob stored under `key`
    ///
    /// Fails with [`crate::Error::Storage`] when the blob does not fit or the
    /// medium rejects the write.
    fn set(&self, key: &str, blob: &str) -> crate::Result<()>;
}

/// Reject `blob` if it would exceed `capacity` bytes (0 means unbounded)
pub(crate) fn check_capacity(key: &str, blob: &str, capacity: usize) -> crate::Result<()> {
    if capacity > 0 && blob.len() > capacity {
        return Err(crate::Error::Storage(format!(
            "writing {} bytes to '{}' exceeds capacity of {} bytes",
            blob.len(),
            key,
            capacity
        )));
    }
    Ok(())
}

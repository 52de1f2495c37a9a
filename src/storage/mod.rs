//! Persistence ports for key-store metadata and container bytes.
//!
//! Both sides are plain key/value blob stores; the backend is chosen by
//! configuration and every backend behaves the same way.

mod fs;
mod object;
mod record;

use std::sync::Arc;

pub use fs::FsBlobStore;
pub use object::ObjectBlobStore;
pub use record::RecordRepository;

use crate::config::StorageBackend;
use crate::error::{CaError, Result};

/// A flat key/value store of byte blobs.
pub trait BlobStore: Send + Sync {
    /// Reads a blob; `None` when the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Creates or replaces a blob.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Removes a blob; `false` when there was nothing to remove.
    fn delete(&self, key: &str) -> Result<bool>;

    /// All keys currently stored.
    fn list(&self) -> Result<Vec<String>>;
}

/// Opens the backend described by `backend`.
pub fn open(backend: &StorageBackend) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match backend {
        StorageBackend::Filesystem { path } => Arc::new(FsBlobStore::new(path)),
        StorageBackend::S3 {
            bucket,
            region,
            prefix,
        } => Arc::new(ObjectBlobStore::s3(bucket, region, prefix.as_deref())?),
        StorageBackend::Memory => Arc::new(ObjectBlobStore::in_memory()?),
    };
    Ok(store)
}

// Keys become file names and object paths, so they stay single segments.
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('.') || key.contains(['/', '\\']) {
        return Err(CaError::Storage {
            context: format!("invalid storage key {key:?}"),
            source: None,
        });
    }
    Ok(())
}

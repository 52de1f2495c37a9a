use std::fmt;
use std::sync::Arc;

use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tokio::runtime::Runtime;

use super::{BlobStore, check_key};
use crate::error::{CaError, Result};

/// Blobs in an object store (S3, or in memory).
///
/// The store API is async; each call is driven to completion on a private
/// current-thread runtime so callers stay synchronous.
pub struct ObjectBlobStore {
    store: Arc<dyn ObjectStore>,
    prefix: Option<Path>,
    runtime: Runtime,
}

impl fmt::Debug for ObjectBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBlobStore")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl ObjectBlobStore {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: Option<&str>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CaError::storage("cannot start object store runtime", e))?;
        let prefix = prefix
            .filter(|p| !p.is_empty())
            .map(Path::parse)
            .transpose()
            .map_err(|e| CaError::storage("invalid object store prefix", e))?;
        Ok(Self {
            store,
            prefix,
            runtime,
        })
    }

    /// S3 bucket; credentials and endpoint come from the usual `AWS_*`
    /// environment variables.
    pub fn s3(bucket: &str, region: &str, prefix: Option<&str>) -> Result<Self> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(region)
            .build()
            .map_err(|e| CaError::storage(format!("cannot configure S3 bucket {bucket}"), e))?;
        tracing::info!(bucket, region, "using S3 object storage");
        Self::new(Arc::new(store), prefix)
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(Arc::new(InMemory::new()), None)
    }

    fn location(&self, key: &str) -> Result<Path> {
        check_key(key)?;
        Ok(match &self.prefix {
            Some(prefix) => prefix.child(key),
            None => Path::from(key),
        })
    }
}

impl BlobStore for ObjectBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let location = self.location(key)?;
        self.runtime.block_on(async {
            match self.store.get(&location).await {
                Ok(result) => {
                    let bytes = result
                        .bytes()
                        .await
                        .map_err(|e| CaError::storage(format!("cannot read {location}"), e))?;
                    Ok(Some(bytes.to_vec()))
                }
                Err(object_store::Error::NotFound { .. }) => Ok(None),
                Err(e) => Err(CaError::storage(format!("cannot read {location}"), e)),
            }
        })
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let location = self.location(key)?;
        let payload = PutPayload::from(bytes.to_vec());
        self.runtime
            .block_on(self.store.put(&location, payload))
            .map(|_| ())
            .map_err(|e| CaError::storage(format!("cannot write {location}"), e))
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let location = self.location(key)?;
        self.runtime.block_on(async {
            // S3 deletes are idempotent and never report a missing key.
            match self.store.head(&location).await {
                Ok(_) => {}
                Err(object_store::Error::NotFound { .. }) => return Ok(false),
                Err(e) => return Err(CaError::storage(format!("cannot delete {location}"), e)),
            }
            self.store
                .delete(&location)
                .await
                .map(|()| true)
                .map_err(|e| CaError::storage(format!("cannot delete {location}"), e))
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let objects: Vec<_> = self
                .store
                .list(self.prefix.as_ref())
                .try_collect()
                .await
                .map_err(|e| CaError::storage("cannot list objects", e))?;
            let mut keys: Vec<String> = objects
                .into_iter()
                .filter_map(|meta| meta.location.filename().map(str::to_string))
                .collect();
            keys.sort();
            Ok(keys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_behaves_like_files() {
        let store = ObjectBlobStore::in_memory().unwrap();
        assert!(store.list().unwrap().is_empty());

        store.put("one.json", b"{}").unwrap();
        store.put("two.json", b"[]").unwrap();
        assert_eq!(store.get("one.json").unwrap().as_deref(), Some(&b"{}"[..]));
        assert_eq!(store.get("missing.json").unwrap(), None);
        assert_eq!(store.list().unwrap(), vec!["one.json", "two.json"]);

        assert!(store.delete("one.json").unwrap());
        assert!(!store.delete("one.json").unwrap());
        assert_eq!(store.list().unwrap(), vec!["two.json"]);
    }

    #[test]
    fn test_prefix_scopes_keys() {
        let shared: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let metadata = ObjectBlobStore::new(shared.clone(), Some("metadata")).unwrap();
        let containers = ObjectBlobStore::new(shared, Some("containers")).unwrap();

        metadata.put("a.json", b"1").unwrap();
        containers.put("a.p12", b"2").unwrap();
        assert_eq!(metadata.list().unwrap(), vec!["a.json"]);
        assert_eq!(containers.list().unwrap(), vec!["a.p12"]);
        assert_eq!(containers.get("a.json").unwrap(), None);
    }
}

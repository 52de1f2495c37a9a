use std::sync::Arc;

use uuid::Uuid;

use super::BlobStore;
use crate::error::{CaError, Result};
use crate::record::KeyStoreRecord;

const RECORD_SUFFIX: &str = ".json";

/// Key-store records as JSON documents named `{id}.json`.
#[derive(Clone)]
pub struct RecordRepository {
    store: Arc<dyn BlobStore>,
}

impl RecordRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    fn key(id: Uuid) -> String {
        format!("{id}{RECORD_SUFFIX}")
    }

    pub fn get(&self, id: Uuid) -> Result<Option<KeyStoreRecord>> {
        self.store
            .get(&Self::key(id))?
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| CaError::storage(format!("record {id} is corrupt"), e))
            })
            .transpose()
    }

    pub fn put(&self, record: &KeyStoreRecord) -> Result<()> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| CaError::storage(format!("cannot encode record {}", record.id), e))?;
        self.store.put(&Self::key(record.id), &json)
    }

    pub fn delete(&self, id: Uuid) -> Result<bool> {
        self.store.delete(&Self::key(id))
    }

    /// Every record, in no particular order. Unparseable documents are skipped
    /// with a warning.
    pub fn list(&self) -> Result<Vec<KeyStoreRecord>> {
        let mut records = Vec::new();
        for key in self.store.list()? {
            let Some(id) = key
                .strip_suffix(RECORD_SUFFIX)
                .and_then(|stem| Uuid::parse_str(stem).ok())
            else {
                continue;
            };
            match self.get(id) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(%id, error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{Record, Result, StoreError, Version, Versioned, store::RecordStore, WriteOptions};

/// In-memory record store.
///
/// Clones share the same underlying map, so a clone handed to a service and
/// one kept by a test observe the same records.
pub struct InMemoryRecordStore<R: Record> {
    records: Arc<RwLock<HashMap<R::Id, Versioned<R>>>>,
}

impl<R: Record> InMemoryRecordStore<R> {
    /// Creates a new empty in-memory record store.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Returns the number of records stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Returns every stored record, in no particular order.
    pub async fn all(&self) -> Vec<Versioned<R>> {
        self.records.read().await.values().cloned().collect()
    }

    /// Removes all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

impl<R: Record> Clone for InMemoryRecordStore<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<R: Record> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> std::fmt::Debug for InMemoryRecordStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_type", &R::record_type())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for InMemoryRecordStore<R> {
    async fn write(&self, record: R, options: WriteOptions) -> Result<Version> {
        let id = record.record_id();
        let mut records = self.records.write().await;

        let current = records
            .get(&id)
            .map(|stored| stored.version)
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current != expected
        {
            if expected == Version::initial() {
                return Err(StoreError::AlreadyExists {
                    record_type: R::record_type(),
                    record_id: id.to_string(),
                });
            }
            if current == Version::initial() {
                return Err(StoreError::NotFound {
                    record_type: R::record_type(),
                    record_id: id.to_string(),
                });
            }
            tracing::debug!(
                record_type = R::record_type(),
                record_id = %id,
                %expected,
                actual = %current,
                "rejecting stale write"
            );
            return Err(StoreError::ConcurrencyConflict {
                record_type: R::record_type(),
                record_id: id.to_string(),
                expected,
                actual: current,
            });
        }

        let version = current.next();
        records.insert(id, Versioned::new(record, version));
        Ok(version)
    }

    async fn load(&self, id: &R::Id) -> Result<Option<Versioned<R>>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn current_version(&self, id: &R::Id) -> Result<Option<Version>> {
        let records = self.records.read().await;
        Ok(records.get(id).map(|stored| stored.version))
    }
}

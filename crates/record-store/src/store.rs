use async_trait::async_trait;

use crate::{Record, Result, StoreError, Version, Versioned};

/// Options for writing a record to the store.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Expected current version of the record for optimistic concurrency.
    /// If None, the write is unconditional (use with caution).
    pub expected_version: Option<Version>,
}

impl WriteOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the record to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the record to not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for record store implementations.
///
/// A write replaces the whole record and bumps its version by one. The
/// version check and the write happen atomically.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Writes a record.
    ///
    /// If `options.expected_version` is set, the write fails with
    /// `ConcurrencyConflict` when the stored version differs, or with
    /// `AlreadyExists` when a create-only write finds an existing record.
    ///
    /// Returns the new version of the record.
    async fn write(&self, record: R, options: WriteOptions) -> Result<Version>;

    /// Loads a record with its current version.
    ///
    /// Returns None if the record doesn't exist.
    async fn load(&self, id: &R::Id) -> Result<Option<Versioned<R>>>;

    /// Gets the current version of a record.
    ///
    /// Returns None if the record doesn't exist.
    async fn current_version(&self, id: &R::Id) -> Result<Option<Version>>;
}

/// Extension trait providing convenience methods for record stores.
#[async_trait]
pub trait RecordStoreExt<R: Record>: RecordStore<R> {
    /// Writes a record that must not exist yet.
    async fn insert(&self, record: R) -> Result<Version> {
        self.write(record, WriteOptions::expect_new()).await
    }

    /// Overwrites a record that must still be at `expected`.
    async fn update(&self, record: R, expected: Version) -> Result<Version> {
        self.write(record, WriteOptions::expect_version(expected))
            .await
    }

    /// Loads a record, failing with `NotFound` if it doesn't exist.
    async fn load_required(&self, id: &R::Id) -> Result<Versioned<R>> {
        self.load(id).await?.ok_or_else(|| StoreError::NotFound {
            record_type: R::record_type(),
            record_id: id.to_string(),
        })
    }

    /// Checks if a record exists.
    async fn exists(&self, id: &R::Id) -> Result<bool> {
        Ok(self.current_version(id).await?.is_some())
    }
}

// Blanket implementation for all RecordStore implementations
impl<R: Record, T: RecordStore<R> + ?Sized> RecordStoreExt<R> for T {}

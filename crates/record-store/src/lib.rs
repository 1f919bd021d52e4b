//! Versioned record persistence used by the delivery core.
//!
//! Records are stored whole and carry a [`Version`] that increments on every
//! write. Conditional writes give the services optimistic concurrency: a
//! read-modify-write fails with [`StoreError::ConcurrencyConflict`] when
//! another writer got there first.

pub mod error;
pub mod memory;
pub mod record;
pub mod store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::InMemoryRecordStore;
pub use record::{Record, Versioned};
pub use store::{RecordStore, RecordStoreExt, WriteOptions};
pub use version::Version;

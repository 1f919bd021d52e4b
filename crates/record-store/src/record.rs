use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::Version;

/// A document that can be kept in a [`RecordStore`](crate::RecordStore).
///
/// Records are written whole; the store never merges fields.
pub trait Record: Clone + Send + Sync + 'static {
    /// Identifier type of this record.
    type Id: Clone + Eq + Hash + Display + Send + Sync + 'static;

    /// Returns the record type name, used in errors and logs.
    fn record_type() -> &'static str;

    /// Returns this record's identifier.
    fn record_id(&self) -> Self::Id;
}

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<R> {
    /// The stored record.
    pub record: R,

    /// Version of the record when it was read or written.
    pub version: Version,
}

impl<R> Versioned<R> {
    /// Wraps a record with its version.
    pub fn new(record: R, version: Version) -> Self {
        Self { record, version }
    }

    /// Discards the version and returns the record.
    pub fn into_record(self) -> R {
        self.record
    }
}

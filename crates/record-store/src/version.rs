use serde::{Deserialize, Serialize};

/// Version number for a stored record, used for optimistic concurrency control.
///
/// A record that has never been written is at version 0. The first write
/// produces version 1 and every later write increments by 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    /// Creates a new version from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the initial version (0) of a record that does not exist yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the version (1) produced by the first write.
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the next version.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw version value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

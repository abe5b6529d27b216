//! Record, type and version identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a logical record, stable across all of its versions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a new record ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer ID.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Name of a concrete record type (e.g. `Page`, `RedirectorPage`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    /// Creates a new type name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the type name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifier of one physical version table.
///
/// Opaque to the pruning core; only the storage adapter interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    /// Creates a new table name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the table name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a hierarchical record sat when a version was written.
///
/// Two versions with different keys mean the record moved or was renamed in
/// between, so an old URL may still point at the older location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationKey {
    /// Identity of the parent container (0 for top level).
    pub parent_id: i64,
    /// Path segment under the parent.
    pub segment: String,
}

impl LocationKey {
    /// Creates a new location key.
    #[must_use]
    pub fn new(parent_id: i64, segment: impl Into<String>) -> Self {
        Self {
            parent_id,
            segment: segment.into(),
        }
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.parent_id, self.segment)
    }
}

/// One historical write of a logical record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// The logical record this version belongs to.
    pub record_id: RecordId,
    /// Version number, unique and increasing per record.
    pub version: i64,
    /// Last edit timestamp (Unix epoch seconds).
    pub last_edited: u64,
    /// Whether this version is a published snapshot.
    pub was_published: bool,
    /// Location at the time of writing; `None` for non-hierarchical types.
    pub location_key: Option<LocationKey>,
    /// Concrete type when this version was written.
    pub type_name: TypeName,
}

impl VersionRecord {
    /// Creates a published version with no location key.
    #[must_use]
    pub fn published(record_id: RecordId, version: i64, last_edited: u64, type_name: &TypeName) -> Self {
        Self {
            record_id,
            version,
            last_edited,
            was_published: true,
            location_key: None,
            type_name: type_name.clone(),
        }
    }

    /// Creates a draft version with no location key.
    #[must_use]
    pub fn draft(record_id: RecordId, version: i64, last_edited: u64, type_name: &TypeName) -> Self {
        Self {
            was_published: false,
            ..Self::published(record_id, version, last_edited, type_name)
        }
    }

    /// Sets the location key.
    #[must_use]
    pub fn at(mut self, location: LocationKey) -> Self {
        self.location_key = Some(location);
        self
    }
}

/// A record together with its current concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// The record identity.
    pub id: RecordId,
    /// The record's current concrete type.
    pub type_name: TypeName,
}

impl RecordRef {
    /// Creates a new record reference.
    #[must_use]
    pub const fn new(id: RecordId, type_name: TypeName) -> Self {
        Self { id, type_name }
    }
}

/// Sorts versions newest first (`last_edited` desc, then `version` desc).
pub fn sort_newest_first(versions: &mut [VersionRecord]) {
    versions.sort_by(|a, b| {
        b.last_edited
            .cmp(&a.last_edited)
            .then_with(|| b.version.cmp(&a.version))
    });
}

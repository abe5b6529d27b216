//! Versioned storage trait.
//!
//! The pruning core never touches tables directly. Everything it needs from
//! the versioned store goes through [`VersionStore`]: reading a record's
//! history, finding which physical tables hold slices of a type, and deleting
//! rows from one table at a time.
//!
//! # Error Modes and Guarantees
//!
//! | Method | Missing record | Backend failure |
//! |--------|----------------|-----------------|
//! | `list_versions` | empty vec | `Error::Storage` |
//! | `current_type` | `None` | `Error::Storage` |
//! | `delete_version_rows` | returns 0 | `Error::Storage` |
//!
//! Deletes are idempotent: deleting rows that are already gone returns 0 and
//! is not an error. No method is expected to open a transaction that spans
//! more than one table.

use crate::Result;
use crate::models::{RecordId, RecordRef, TableName, TypeName, VersionRecord};

/// Trait for the versioned-storage collaborator.
///
/// # Implementor Notes
///
/// - Methods use `&self` to enable sharing via `Arc<dyn VersionStore>`
/// - Use interior mutability (e.g., `Mutex<Connection>`) for mutable state
/// - `list_versions` must return rows newest first: `last_edited` descending,
///   ties broken by `version` descending
/// - `physical_tables_for` is a pure schema query and must not depend on data
pub trait VersionStore: Send + Sync {
    /// Returns every version row of a record, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_versions(&self, record_id: RecordId) -> Result<Vec<VersionRecord>>;

    /// Returns the physical version tables for a type's whole hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not known to the schema.
    fn physical_tables_for(&self, type_name: &TypeName) -> Result<Vec<TableName>>;

    /// Returns a type followed by its ancestors, concrete type first.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is not known to the schema.
    fn type_ancestry(&self, type_name: &TypeName) -> Result<Vec<TypeName>>;

    /// Returns the record's current concrete type, or `None` if the record
    /// no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn current_type(&self, record_id: RecordId) -> Result<Option<TypeName>>;

    /// Returns the version currently visible as published, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn live_version(&self, record_id: RecordId) -> Result<Option<i64>>;

    /// Returns the current draft (stage) version, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn draft_head(&self, record_id: RecordId) -> Result<Option<i64>>;

    /// Returns `true` if `version` is the record's live version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn is_live(&self, record_id: RecordId, version: i64) -> Result<bool> {
        Ok(self.live_version(record_id)? == Some(version))
    }

    /// Returns `true` if `version` is the record's draft head.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn is_draft_head(&self, record_id: RecordId, version: i64) -> Result<bool> {
        Ok(self.draft_head(record_id)? == Some(version))
    }

    /// Deletes the given versions of a record from one table.
    ///
    /// Returns the number of rows actually removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_version_rows(
        &self,
        table: &TableName,
        record_id: RecordId,
        versions: &[i64],
    ) -> Result<usize>;

    /// Deletes every version of a record from one table.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    fn delete_all_version_rows(&self, table: &TableName, record_id: RecordId) -> Result<usize>;

    /// Lists records of a type (or any subtype) that have a live version.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_live_records(&self, type_name: &TypeName) -> Result<Vec<RecordRef>>;

    /// Lists record IDs that still have version rows for a type hierarchy but
    /// no longer exist as records.
    ///
    /// When `edited_before` is set, only records whose newest version was
    /// edited before that timestamp are returned. Results are ordered by
    /// newest edit first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_orphaned_records(
        &self,
        type_name: &TypeName,
        edited_before: Option<u64>,
    ) -> Result<Vec<RecordId>>;

    /// Reclaims storage for tables that had rows deleted.
    ///
    /// The default implementation does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend maintenance command fails.
    fn vacuum(&self, tables: &[TableName]) -> Result<()> {
        let _ = tables;
        Ok(())
    }
}

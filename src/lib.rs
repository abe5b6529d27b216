//! # Keepset
//!
//! A retention-policy engine for versioned record stores.
//!
//! Every write to a versioned record appends a version row. Keepset decides
//! which of those historical rows can be deleted once a record is published,
//! and removes them from every physical table that stores a slice of the
//! record, while keeping enough history for rollback and for resolving old
//! URLs after a record has moved.
//!
//! ## Features
//!
//! - Count-based retention for published and draft history, independently
//! - Redirect preservation: the newest version at every former location survives
//! - Automatic cleanup of versions written under a previous record type
//! - Batch maintenance: full prune, reset to live, orphan and archive purges
//! - Pluggable storage through the [`VersionStore`] trait, with a `SQLite` adapter
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keepset::{KeepsetConfig, RecordId, RetentionPruner, SqliteVersionStore};
//!
//! let config = KeepsetConfig::load_default()?;
//! let store = Arc::new(SqliteVersionStore::open(&config.database, &config.base_type)?);
//! let pruner = RetentionPruner::new(store, config);
//!
//! let outcome = pruner.prune_record(RecordId::new(42), false)?;
//! println!("{}", outcome.summary());
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod cli;
pub mod config;
pub mod hooks;
pub mod models;
pub mod observability;
pub mod prune;
pub mod storage;

// Re-exports for convenience
pub use config::{KeepsetConfig, PolicyOverride, RetentionSettings, SettingValue};
pub use hooks::{HookHandler, PublishHook};
pub use models::{
    Limit, LocationKey, RecordId, RecordRef, RetentionPolicy, TableName, TypeName, VersionRecord,
};
pub use prune::{
    ArchivePurgeOptions, BatchResult, DeletionPlan, ProtectedVersions, PruneOutcome,
    RetentionPruner, TypeOutcome, plan_deletions,
};
pub use storage::{SqliteVersionStore, TypeSchema, VersionStore};

/// Error type for keepset operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `RecordNotFound` | The record has no current row; callers treat this as a no-op |
/// | `Storage` | A backend query or delete fails; already-applied deletes are kept |
/// | `Config` | A retention value is malformed or cannot be resolved for a type |
/// | `InvalidInput` | Unknown type names, bad identifiers, bad CLI arguments |
/// | `OperationFailed` | Logging, metrics or output setup fails |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The logical record does not exist.
    ///
    /// Raised when the store has no current type for a record. Pruning a
    /// missing record is not a failure: the pruner filters this with
    /// [`Error::is_benign`] and reports zero deletions.
    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    /// A storage backend operation failed.
    ///
    /// Raised when:
    /// - The database cannot be opened or a statement cannot be prepared
    /// - A per-table delete fails mid-run (earlier tables stay pruned)
    /// - The connection is lost during a batch
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A retention setting is malformed or unresolvable.
    ///
    /// Pruning fails closed: the affected type is skipped rather than pruned
    /// with a guessed default.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A type name is not registered in the schema
    /// - A table identifier contains characters outside `[A-Za-z0-9_]`
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A non-storage operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns `true` for errors that callers should treat as a no-op.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::RecordNotFound(_))
    }

    /// Builds a [`Error::Storage`] from an operation name and any displayable cause.
    pub fn storage(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for keepset operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use keepset::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

//! Storage layer abstraction.
//!
//! The pruning core talks to storage only through [`VersionStore`].
//! [`SqliteVersionStore`] is the bundled adapter.

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::{SqliteVersionStore, TypeSchema};
pub use traits::VersionStore;

use std::path::PathBuf;

/// Returns the default database path under the user data directory.
///
/// Falls back to the current directory when no home directory is known.
#[must_use]
pub fn default_database_path() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".").join(".keepset").join("keepset.db"),
        |b| b.data_local_dir().join("keepset").join("keepset.db"),
    )
}

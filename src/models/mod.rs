//! Data models for keepset.
//!
//! Identifiers, version rows and retention policy values shared by the
//! pruning core and the storage adapters.

mod policy;
mod record;

pub use policy::{DEFAULT_KEEP_DRAFTS, DEFAULT_KEEP_VERSIONS, Limit, RetentionPolicy};
pub use record::{
    LocationKey, RecordId, RecordRef, TableName, TypeName, VersionRecord, sort_newest_first,
};

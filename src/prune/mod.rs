//! Version retention and pruning.
//!
//! - [`planner`]: the pure keep/delete pass over one record's history
//! - [`pruner`]: [`RetentionPruner`], which runs the pass against a store
//! - [`result`]: per-record and per-type outcomes

pub mod planner;
mod pruner;
mod result;

pub use planner::{DeleteReason, DeletionPlan, ProtectedVersions, plan_deletions};
pub use pruner::{ArchivePurgeOptions, DEFAULT_ARCHIVE_LIMIT, RetentionPruner};
pub use result::{BatchResult, PruneOutcome, TypeOutcome};

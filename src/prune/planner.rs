//! The retention pass.
//!
//! Classifies each historical version of one record as keep or delete in a
//! single newest-first walk. Pure: no storage access, no side effects.
//!
//! # Rules
//!
//! For every row, newest first:
//!
//! 1. A row written under a type other than the record's current type is
//!    deleted when `keep_old_types` is off. When it is on the row is kept
//!    and does not occupy a history slot.
//! 2. A draft row takes the next draft slot and is deleted once the slots
//!    run out. With drafts unlimited nothing is counted.
//! 3. A published row takes the next published slot. Inside the window it is
//!    kept; beyond it, it is deleted unless redirects are kept and it is the
//!    first row seen at its location.
//!
//! The live version and the draft head take their slot like any other row
//! but are never deleted.

use crate::models::{LocationKey, RetentionPolicy, TypeName, VersionRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// The versions a record may not lose.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtectedVersions {
    /// The version currently visible as published.
    pub live: Option<i64>,
    /// The current draft (stage) version.
    pub draft_head: Option<i64>,
}

impl ProtectedVersions {
    /// Creates a new set of protected versions.
    #[must_use]
    pub const fn new(live: Option<i64>, draft_head: Option<i64>) -> Self {
        Self { live, draft_head }
    }

    /// Returns `true` if `version` is protected.
    #[must_use]
    pub fn contains(&self, version: i64) -> bool {
        self.live == Some(version) || self.draft_head == Some(version)
    }
}

/// Why a row was marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteReason {
    /// Written under a previous record type.
    OldType,
    /// Beyond the draft history window.
    DraftOverflow,
    /// Beyond the published history window and not needed for a redirect.
    PublishedOverflow,
}

/// The output of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    /// Marked versions with the reason each was marked, newest first.
    pub marked: Vec<(i64, DeleteReason)>,
    /// Types the marked rows were written under.
    pub types: BTreeSet<TypeName>,
    /// Rows examined.
    pub examined: usize,
}

impl DeletionPlan {
    /// Returns the marked version numbers.
    #[must_use]
    pub fn versions(&self) -> Vec<i64> {
        self.marked.iter().map(|(v, _)| *v).collect()
    }

    /// Returns `true` if nothing was marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }

    /// Counts marked rows for one reason.
    #[must_use]
    pub fn count(&self, reason: DeleteReason) -> usize {
        self.marked.iter().filter(|(_, r)| *r == reason).count()
    }
}

/// Computes which versions of a record to delete.
///
/// `versions` must be ordered newest first (`last_edited` descending, ties by
/// `version` descending), as returned by
/// [`VersionStore::list_versions`](crate::storage::VersionStore::list_versions).
#[must_use]
pub fn plan_deletions(
    versions: &[VersionRecord],
    current_type: &TypeName,
    protected: ProtectedVersions,
    policy: &RetentionPolicy,
) -> DeletionPlan {
    let mut plan = DeletionPlan {
        examined: versions.len(),
        ..DeletionPlan::default()
    };
    let mut published_seen: u32 = 0;
    let mut drafts_seen: u32 = 0;
    let mut seen_locations: HashSet<&LocationKey> = HashSet::new();

    for row in versions {
        let is_protected = protected.contains(row.version);

        let reason = if &row.type_name == current_type {
            classify_current(
                row,
                policy,
                is_protected,
                &mut published_seen,
                &mut drafts_seen,
                &mut seen_locations,
            )
        } else if policy.keep_old_types {
            None
        } else {
            Some(DeleteReason::OldType)
        };

        if let Some(reason) = reason.filter(|_| !is_protected) {
            plan.marked.push((row.version, reason));
            plan.types.insert(row.type_name.clone());
        }
    }

    plan
}

fn classify_current<'a>(
    row: &'a VersionRecord,
    policy: &RetentionPolicy,
    is_protected: bool,
    published_seen: &mut u32,
    drafts_seen: &mut u32,
    seen_locations: &mut HashSet<&'a LocationKey>,
) -> Option<DeleteReason> {
    if !row.was_published {
        let limit = policy.keep_drafts.count()?;
        *drafts_seen = drafts_seen.saturating_add(1);
        return (*drafts_seen > limit).then_some(DeleteReason::DraftOverflow);
    }

    let limit = policy.keep_versions.count()?;
    *published_seen = published_seen.saturating_add(1);

    if *published_seen <= limit || is_protected {
        if policy.keep_redirects {
            if let Some(key) = &row.location_key {
                seen_locations.insert(key);
            }
        }
        return None;
    }

    if policy.keep_redirects {
        if let Some(key) = &row.location_key {
            if seen_locations.insert(key) {
                return None;
            }
        }
    }

    Some(DeleteReason::PublishedOverflow)
}

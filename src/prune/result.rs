//! Outcomes of prune runs.

use super::planner::{DeleteReason, DeletionPlan};
use crate::models::{RecordId, TypeName};
use serde::Serialize;
use std::collections::BTreeMap;

/// Result of pruning a single record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneOutcome {
    /// The record that was pruned.
    pub record_id: RecordId,
    /// The record's type at prune time, `None` if the record no longer exists.
    pub type_name: Option<TypeName>,
    /// Versions selected for deletion.
    pub candidates: Vec<i64>,
    /// Physical rows actually removed, summed over every table. Zero for a
    /// dry run, or when an overlapping prune removed them first.
    pub rows_deleted: usize,
    /// Candidates written under a previous type.
    pub old_type: usize,
    /// Candidates beyond the draft window.
    pub drafts: usize,
    /// Candidates beyond the published window.
    pub published: usize,
    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,
}

impl PruneOutcome {
    pub(crate) fn missing(record_id: RecordId, dry_run: bool) -> Self {
        Self {
            record_id,
            dry_run,
            ..Self::default()
        }
    }

    pub(crate) fn from_plan(
        record_id: RecordId,
        type_name: TypeName,
        plan: &DeletionPlan,
        dry_run: bool,
    ) -> Self {
        Self {
            record_id,
            type_name: Some(type_name),
            candidates: plan.versions(),
            rows_deleted: 0,
            old_type: plan.count(DeleteReason::OldType),
            drafts: plan.count(DeleteReason::DraftOverflow),
            published: plan.count(DeleteReason::PublishedOverflow),
            dry_run,
        }
    }

    /// Returns the number of versions deleted, or that would be deleted in a
    /// dry run.
    #[must_use]
    pub fn versions_removed(&self) -> usize {
        self.candidates.len()
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let Some(type_name) = &self.type_name else {
            return format!("Record {} not found, nothing to prune", self.record_id);
        };
        if self.candidates.is_empty() {
            return format!("Record {} ({type_name}): nothing to prune", self.record_id);
        }
        let breakdown = format!(
            "(old type: {}, drafts: {}, published: {})",
            self.old_type, self.drafts, self.published
        );
        if self.dry_run {
            format!(
                "Record {} ({type_name}): would delete {} versions {breakdown}",
                self.record_id,
                self.candidates.len()
            )
        } else {
            format!(
                "Record {} ({type_name}): deleted {} rows for {} versions {breakdown}",
                self.record_id,
                self.rows_deleted,
                self.candidates.len()
            )
        }
    }
}

/// Result of a batch operation for one requested type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeOutcome {
    /// The requested type.
    pub type_name: TypeName,
    /// Records examined, including skipped ones.
    pub records_checked: usize,
    /// Records with at least one version selected.
    pub records_pruned: usize,
    /// Versions selected for deletion.
    pub versions_deleted: usize,
    /// Physical rows actually removed across all tables.
    pub rows_deleted: usize,
    /// Records left alone because their type's policy did not resolve.
    pub records_skipped: usize,
    /// Concrete types whose policy did not resolve, with the reason.
    pub skipped_types: BTreeMap<TypeName, String>,
    /// Why this type stopped early, if it did.
    pub error: Option<String>,
}

impl TypeOutcome {
    /// Creates an empty outcome for a type.
    #[must_use]
    pub const fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            records_checked: 0,
            records_pruned: 0,
            versions_deleted: 0,
            rows_deleted: 0,
            records_skipped: 0,
            skipped_types: BTreeMap::new(),
            error: None,
        }
    }

    pub(crate) fn absorb(&mut self, outcome: &PruneOutcome) {
        self.records_checked += 1;
        if !outcome.candidates.is_empty() {
            self.records_pruned += 1;
        }
        self.versions_deleted += outcome.candidates.len();
        self.rows_deleted += outcome.rows_deleted;
    }

    pub(crate) fn skip(&mut self, type_name: &TypeName, reason: String) {
        self.records_checked += 1;
        self.records_skipped += 1;
        self.skipped_types.entry(type_name.clone()).or_insert(reason);
    }

    /// Returns `true` if this type finished without error and skipped nothing.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.skipped_types.is_empty()
    }

    /// Returns a one-line summary for this type.
    #[must_use]
    pub fn summary(&self, dry_run: bool) -> String {
        let mut line = if dry_run {
            format!(
                "{}: would delete {} versions from {} of {} records",
                self.type_name, self.versions_deleted, self.records_pruned, self.records_checked
            )
        } else {
            format!(
                "{}: deleted {} rows for {} versions from {} of {} records",
                self.type_name,
                self.rows_deleted,
                self.versions_deleted,
                self.records_pruned,
                self.records_checked
            )
        };
        for (skipped, reason) in &self.skipped_types {
            line.push_str(&format!(" (skipped {skipped}: {reason})"));
        }
        if let Some(error) = &self.error {
            line.push_str(&format!(" (stopped: {error})"));
        }
        line
    }
}

/// Result of a batch operation over one or more types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Operation name (`prune`, `reset`, `orphans`, `archived`).
    pub operation: String,
    /// One entry per requested type, in request order.
    pub types: Vec<TypeOutcome>,
    /// Whether this was a dry run (no actual changes made).
    pub dry_run: bool,
    /// Whether storage was vacuumed afterwards.
    pub vacuumed: bool,
    /// Duration of the operation in milliseconds.
    pub duration_ms: u64,
}

impl BatchResult {
    pub(crate) fn new(operation: &str, dry_run: bool) -> Self {
        Self {
            operation: operation.to_string(),
            dry_run,
            ..Self::default()
        }
    }

    /// Total versions deleted (or selected) over all types.
    #[must_use]
    pub fn total_deleted(&self) -> usize {
        self.types.iter().map(|t| t.versions_deleted).sum()
    }

    /// Total physical rows removed over all types.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.types.iter().map(|t| t.rows_deleted).sum()
    }

    /// Total records examined over all types.
    #[must_use]
    pub fn records_checked(&self) -> usize {
        self.types.iter().map(|t| t.records_checked).sum()
    }

    /// Returns `true` if any type stopped with an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.types.iter().any(|t| !t.is_ok())
    }

    /// Returns the outcome for a type, if it was requested.
    #[must_use]
    pub fn for_type(&self, type_name: &TypeName) -> Option<&TypeOutcome> {
        self.types.iter().find(|t| &t.type_name == type_name)
    }

    /// Returns a human-readable summary of the whole run.
    #[must_use]
    pub fn summary(&self) -> String {
        let failed = self.types.iter().filter(|t| !t.is_ok()).count();
        let mut line = if self.dry_run {
            format!(
                "{}: would delete {} versions ({} records checked in {}ms)",
                self.operation,
                self.total_deleted(),
                self.records_checked(),
                self.duration_ms
            )
        } else {
            format!(
                "{}: deleted {} rows for {} versions ({} records checked in {}ms)",
                self.operation,
                self.total_rows(),
                self.total_deleted(),
                self.records_checked(),
                self.duration_ms
            )
        };
        if failed > 0 {
            line.push_str(&format!(", {failed} types failed"));
        }
        if self.vacuumed {
            line.push_str(", storage vacuumed");
        }
        line
    }

    /// Returns one line per type followed by the overall summary.
    #[must_use]
    pub fn summary_lines(&self) -> Vec<String> {
        self.types
            .iter()
            .map(|t| t.summary(self.dry_run))
            .chain(std::iter::once(self.summary()))
            .collect()
    }
}

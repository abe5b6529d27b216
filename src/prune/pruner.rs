//! Retention pruner.
//!
//! Drives [`plan_deletions`] against a [`VersionStore`] and removes the
//! selected versions from every physical table that holds a slice of them.
//!
//! # Example
//!
//! ```rust,ignore
//! use keepset::{KeepsetConfig, RetentionPruner, SqliteVersionStore, TypeName};
//! use std::sync::Arc;
//!
//! let config = KeepsetConfig::load_default()?;
//! let store = Arc::new(SqliteVersionStore::open(&config.database, &config.base_type)?);
//! let pruner = RetentionPruner::new(store, config);
//!
//! // See what a full prune would remove
//! let result = pruner.prune_all(&[TypeName::from("Page")], true)?;
//! for line in result.summary_lines() {
//!     println!("{line}");
//! }
//! ```

use super::planner::{ProtectedVersions, plan_deletions};
use super::result::{BatchResult, PruneOutcome, TypeOutcome};
use crate::config::KeepsetConfig;
use crate::models::{RecordId, RetentionPolicy, TableName, TypeName, sort_newest_first};
use crate::storage::VersionStore;
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, instrument, warn};

/// Default maximum number of records removed by one archived purge.
pub const DEFAULT_ARCHIVE_LIMIT: usize = 500;

const SECONDS_PER_DAY: u64 = 86_400;

/// Safely converts Duration to milliseconds as u64, capping at `u64::MAX`.
#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Converts usize to u64 for metrics counters.
#[inline]
fn usize_to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Converts u64 to f64 for metrics, capping at `u32::MAX`.
#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

/// Options for [`RetentionPruner::purge_archived`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePurgeOptions {
    /// Type hierarchy to purge.
    pub type_name: TypeName,
    /// Only purge records whose newest version is older than this many days.
    pub older_than_days: Option<u32>,
    /// Maximum records purged in one run.
    pub limit: usize,
    /// Report without deleting.
    pub dry_run: bool,
}

impl ArchivePurgeOptions {
    /// Creates options for a type with the default limit and no age cutoff.
    #[must_use]
    pub const fn new(type_name: TypeName) -> Self {
        Self {
            type_name,
            older_than_days: None,
            limit: DEFAULT_ARCHIVE_LIMIT,
            dry_run: false,
        }
    }

    /// Sets the age cutoff in days.
    #[must_use]
    pub const fn with_older_than_days(mut self, days: u32) -> Self {
        self.older_than_days = Some(days);
        self
    }

    /// Sets the record limit.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Enables or disables dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Returns the `last_edited` cutoff for `now`, if an age limit is set.
    #[must_use]
    pub fn cutoff(&self, now: u64) -> Option<u64> {
        self.older_than_days
            .map(|days| now.saturating_sub(u64::from(days) * SECONDS_PER_DAY))
    }
}

/// Counts removed rows, and the versions behind them when any row went.
fn record_deleted(outcome: &PruneOutcome) {
    if outcome.rows_deleted == 0 {
        return;
    }
    metrics::counter!("prune_rows_deleted_total").increment(usize_to_u64(outcome.rows_deleted));
    metrics::counter!("prune_versions_deleted_total")
        .increment(usize_to_u64(outcome.candidates.len()));
}

/// Formats a Unix timestamp as RFC 3339, falling back to the raw seconds.
fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map_or_else(|| ts.to_string(), |dt| dt.to_rfc3339())
}

/// State shared by every record in one batch run.
#[derive(Default)]
struct RunState {
    seen: HashSet<RecordId>,
    touched: BTreeSet<TableName>,
    /// Resolved policy per concrete type, or the reason it failed to resolve.
    policies: BTreeMap<TypeName, std::result::Result<RetentionPolicy, String>>,
}

/// Turns a vanished record into an empty outcome.
fn missing_as_noop(
    record_id: RecordId,
    dry_run: bool,
    result: Result<PruneOutcome>,
) -> Result<PruneOutcome> {
    match result {
        Err(e) if e.is_benign() => {
            debug!(record_id = %record_id, "Record not found, nothing to prune");
            metrics::counter!("prune_records_total", "outcome" => "missing").increment(1);
            Ok(PruneOutcome::missing(record_id, dry_run))
        },
        other => other,
    }
}

/// Prunes historical versions according to retention policy.
///
/// # Thread Safety
///
/// The pruner holds an `Arc` reference to the store, making it safe to share
/// across threads. Concurrent prunes of the same record are safe because
/// deletes are idempotent.
pub struct RetentionPruner<S: VersionStore> {
    store: Arc<S>,
    config: KeepsetConfig,
}

impl<S: VersionStore> RetentionPruner<S> {
    /// Creates a new pruner.
    #[must_use]
    pub fn new(store: Arc<S>, config: KeepsetConfig) -> Self {
        // Arc::strong_count prevents clippy::missing_const_for_fn false positive
        let _ = Arc::strong_count(&store);
        Self { store, config }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &KeepsetConfig {
        &self.config
    }

    /// Resolves the configured policy for a concrete type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the store does not know the type,
    /// or [`Error::Config`] if a setting along its ancestry is malformed.
    pub fn policy_for(&self, type_name: &TypeName) -> Result<RetentionPolicy> {
        let ancestry = self.store.type_ancestry(type_name)?;
        self.config.resolve_policy(&ancestry)
    }

    /// Prunes one record using the policy configured for its type.
    ///
    /// A record that no longer exists is not an error: the outcome reports
    /// nothing deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot be resolved or storage fails.
    /// Deletes already applied to earlier tables are kept.
    #[instrument(
        name = "keepset.prune.record",
        skip(self),
        fields(record_id = %record_id, dry_run = dry_run)
    )]
    pub fn prune_record(&self, record_id: RecordId, dry_run: bool) -> Result<PruneOutcome> {
        let mut state = RunState::default();
        let result = self.current_type_of(record_id).and_then(|type_name| {
            let policy = self.policy_for(&type_name)?;
            self.prune_typed(record_id, &type_name, &policy, dry_run, &mut state)
        });
        missing_as_noop(record_id, dry_run, result)
    }

    /// Prunes one record with an explicit policy.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    #[instrument(
        name = "keepset.prune.record",
        skip(self, policy),
        fields(record_id = %record_id, dry_run = dry_run, policy = %policy)
    )]
    pub fn prune_record_with_policy(
        &self,
        record_id: RecordId,
        policy: &RetentionPolicy,
        dry_run: bool,
    ) -> Result<PruneOutcome> {
        let mut state = RunState::default();
        let result = self.current_type_of(record_id).and_then(|type_name| {
            self.prune_typed(record_id, &type_name, policy, dry_run, &mut state)
        });
        missing_as_noop(record_id, dry_run, result)
    }

    /// Prunes every live record of the given types with their configured
    /// policies.
    ///
    /// A failure stops the affected type and is reported in its
    /// [`TypeOutcome`]; remaining types still run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `types` is empty.
    #[instrument(
        name = "keepset.prune.all",
        skip(self, types),
        fields(types = types.len(), dry_run = dry_run)
    )]
    pub fn prune_all(&self, types: &[TypeName], dry_run: bool) -> Result<BatchResult> {
        self.run_live_batch("prune", types, None, dry_run)
    }

    /// Like [`prune_all`](Self::prune_all), with one policy for every record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `types` is empty.
    pub fn prune_all_with_policy(
        &self,
        types: &[TypeName],
        policy: &RetentionPolicy,
        dry_run: bool,
    ) -> Result<BatchResult> {
        self.run_live_batch("prune", types, Some(policy), dry_run)
    }

    /// Deletes all history of live records except the live version and the
    /// draft head.
    ///
    /// Records that were never published are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `types` is empty.
    #[instrument(
        name = "keepset.prune.reset",
        skip(self, types),
        fields(types = types.len(), dry_run = dry_run)
    )]
    pub fn reset_to_live_only(&self, types: &[TypeName], dry_run: bool) -> Result<BatchResult> {
        self.run_live_batch("reset", types, Some(&RetentionPolicy::live_only()), dry_run)
    }

    /// Deletes every version row of records that no longer exist.
    ///
    /// Unpublished records still have a draft row and are not touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the orphan query fails before any record is
    /// processed.
    #[instrument(
        name = "keepset.prune.orphans",
        skip(self),
        fields(type_name = %type_name, dry_run = dry_run)
    )]
    pub fn prune_orphaned_versions(&self, type_name: &TypeName, dry_run: bool) -> Result<BatchResult> {
        let orphans = self.store.list_orphaned_records(type_name, None)?;
        Ok(self.purge_batch("orphans", type_name, &orphans, dry_run))
    }

    /// Deletes every version of archived records, newest first, up to the
    /// configured limit.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive query fails.
    #[instrument(
        name = "keepset.prune.archived",
        skip(self, options),
        fields(
            type_name = %options.type_name,
            older_than_days = ?options.older_than_days,
            limit = options.limit,
            dry_run = options.dry_run
        )
    )]
    pub fn purge_archived(&self, options: &ArchivePurgeOptions) -> Result<BatchResult> {
        let cutoff = options.cutoff(crate::current_timestamp());
        if let Some(cutoff) = cutoff {
            debug!(cutoff = %format_timestamp(cutoff), "Purging archived records edited before cutoff");
        }
        let mut archived = self
            .store
            .list_orphaned_records(&options.type_name, cutoff)?;
        if archived.len() > options.limit {
            debug!(
                found = archived.len(),
                limit = options.limit,
                "Archived records exceed limit, truncating run"
            );
            archived.truncate(options.limit);
        }
        Ok(self.purge_batch("archived", &options.type_name, &archived, options.dry_run))
    }

    fn run_live_batch(
        &self,
        operation: &str,
        types: &[TypeName],
        policy: Option<&RetentionPolicy>,
        dry_run: bool,
    ) -> Result<BatchResult> {
        if types.is_empty() {
            return Err(Error::InvalidInput("no types requested".to_string()));
        }
        let start = Instant::now();
        let mut result = BatchResult::new(operation, dry_run);
        let mut state = RunState::default();

        for type_name in types {
            let _span = info_span!("keepset.prune.type", type_name = %type_name).entered();
            let mut outcome = TypeOutcome::new(type_name.clone());
            if let Err(e) = self.prune_type(type_name, policy, dry_run, &mut state, &mut outcome) {
                warn!(type_name = %type_name, error = %e, "Stopped pruning type");
                outcome.error = Some(e.to_string());
            }
            result.types.push(outcome);
        }

        self.finish(&mut result, &state, start);
        Ok(result)
    }

    fn prune_type(
        &self,
        type_name: &TypeName,
        policy: Option<&RetentionPolicy>,
        dry_run: bool,
        state: &mut RunState,
        outcome: &mut TypeOutcome,
    ) -> Result<()> {
        let records = self.store.list_live_records(type_name)?;
        debug!(records = records.len(), "Listed live records");

        for record in records {
            if !state.seen.insert(record.id) {
                continue;
            }
            let effective = match policy {
                Some(policy) => *policy,
                None => match self.cached_policy(&record.type_name, state)? {
                    Ok(policy) => policy,
                    Err(reason) => {
                        debug!(
                            record_id = %record.id,
                            type_name = %record.type_name,
                            "Skipping record with unresolvable policy"
                        );
                        metrics::counter!("prune_records_total", "outcome" => "skipped")
                            .increment(1);
                        outcome.skip(&record.type_name, reason);
                        continue;
                    },
                },
            };
            let pruned =
                self.prune_typed(record.id, &record.type_name, &effective, dry_run, state)?;
            outcome.absorb(&pruned);
        }
        Ok(())
    }

    /// Resolves a type's policy once per run.
    ///
    /// A configuration error is cached as the inner `Err` so every record of
    /// that type is skipped; any other failure is returned and stops the run
    /// for the requested type.
    fn cached_policy(
        &self,
        type_name: &TypeName,
        state: &mut RunState,
    ) -> Result<std::result::Result<RetentionPolicy, String>> {
        if let Some(cached) = state.policies.get(type_name) {
            return Ok(cached.clone());
        }
        let resolved = match self.policy_for(type_name) {
            Ok(policy) => Ok(policy),
            Err(e @ Error::Config(_)) => {
                warn!(type_name = %type_name, error = %e, "Skipping type with unresolvable policy");
                Err(e.to_string())
            },
            Err(e) => return Err(e),
        };
        state.policies.insert(type_name.clone(), resolved.clone());
        Ok(resolved)
    }

    fn current_type_of(&self, record_id: RecordId) -> Result<TypeName> {
        self.store
            .current_type(record_id)?
            .ok_or(Error::RecordNotFound(record_id))
    }

    /// The single-record pass shared by every live-record operation.
    fn prune_typed(
        &self,
        record_id: RecordId,
        current_type: &TypeName,
        policy: &RetentionPolicy,
        dry_run: bool,
        state: &mut RunState,
    ) -> Result<PruneOutcome> {
        let start = Instant::now();

        let mut versions = self.store.list_versions(record_id)?;
        sort_newest_first(&mut versions);
        let protected = ProtectedVersions::new(
            self.store.live_version(record_id)?,
            self.store.draft_head(record_id)?,
        );

        let plan = plan_deletions(&versions, current_type, protected, policy);
        let mut outcome = PruneOutcome::from_plan(record_id, current_type.clone(), &plan, dry_run);

        if !plan.is_empty() && !dry_run {
            let tables = self.delete_tables(current_type, &plan.types)?;
            let marked = plan.versions();
            for table in &tables {
                outcome.rows_deleted += self.store.delete_version_rows(table, record_id, &marked)?;
            }
            state.touched.extend(tables);
        }

        let status = if plan.is_empty() { "unchanged" } else { "pruned" };
        metrics::counter!("prune_records_total", "outcome" => status).increment(1);
        record_deleted(&outcome);
        metrics::histogram!("prune_duration_ms", "operation" => "record")
            .record(u64_to_f64(duration_to_millis(start.elapsed())));

        debug!(
            record_id = %record_id,
            type_name = %current_type,
            examined = plan.examined,
            candidates = outcome.candidates.len(),
            rows_deleted = outcome.rows_deleted,
            dry_run,
            "Pruned record"
        );

        Ok(outcome)
    }

    /// Removes every version of each record, for records that no longer exist.
    fn purge_batch(
        &self,
        operation: &str,
        type_name: &TypeName,
        records: &[RecordId],
        dry_run: bool,
    ) -> BatchResult {
        let start = Instant::now();
        let mut result = BatchResult::new(operation, dry_run);
        let mut state = RunState::default();
        let mut outcome = TypeOutcome::new(type_name.clone());

        for record_id in records {
            match self.purge_record(*record_id, type_name, dry_run, &mut state) {
                Ok(purged) => outcome.absorb(&purged),
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "Stopped purging type");
                    outcome.error = Some(e.to_string());
                    break;
                },
            }
        }

        result.types.push(outcome);
        self.finish(&mut result, &state, start);
        result
    }

    fn purge_record(
        &self,
        record_id: RecordId,
        type_name: &TypeName,
        dry_run: bool,
        state: &mut RunState,
    ) -> Result<PruneOutcome> {
        let mut versions = self.store.list_versions(record_id)?;
        sort_newest_first(&mut versions);

        let mut outcome = PruneOutcome {
            record_id,
            type_name: versions.first().map(|v| v.type_name.clone()),
            candidates: versions.iter().map(|v| v.version).collect(),
            dry_run,
            ..PruneOutcome::default()
        };
        outcome.old_type = versions
            .iter()
            .filter(|v| outcome.type_name.as_ref() != Some(&v.type_name))
            .count();

        if versions.is_empty() || dry_run {
            return Ok(outcome);
        }

        let written_as: BTreeSet<TypeName> = versions.into_iter().map(|v| v.type_name).collect();
        let tables = self.delete_tables(type_name, &written_as)?;
        for table in &tables {
            outcome.rows_deleted += self.store.delete_all_version_rows(table, record_id)?;
        }
        state.touched.extend(tables);

        record_deleted(&outcome);
        debug!(
            record_id = %record_id,
            versions = outcome.candidates.len(),
            rows_deleted = outcome.rows_deleted,
            "Purged record history"
        );
        Ok(outcome)
    }

    /// Returns the tables to delete from: every table of `primary` and of
    /// each type in `also`, with the shared base table last.
    ///
    /// Types the store no longer knows are skipped with a warning.
    fn delete_tables(
        &self,
        primary: &TypeName,
        also: &BTreeSet<TypeName>,
    ) -> Result<Vec<TableName>> {
        let primary_tables = self.store.physical_tables_for(primary)?;
        let base = primary_tables.last().cloned();

        let mut tables: Vec<TableName> = Vec::new();
        let mut push = |table: TableName| {
            if Some(&table) != base.as_ref() && !tables.contains(&table) {
                tables.push(table);
            }
        };

        for type_name in also.iter().filter(|t| *t != primary) {
            match self.store.physical_tables_for(type_name) {
                Ok(found) => found.into_iter().for_each(&mut push),
                Err(e) => warn!(
                    type_name = %type_name,
                    error = %e,
                    "Skipping tables of unknown type"
                ),
            }
        }
        primary_tables.into_iter().for_each(&mut push);
        tables.extend(base);

        Ok(tables)
    }

    fn finish(&self, result: &mut BatchResult, state: &RunState, start: Instant) {
        if self.config.vacuum_tables && !result.dry_run && result.total_rows() > 0 {
            let touched: Vec<TableName> = state.touched.iter().cloned().collect();
            match self.store.vacuum(&touched) {
                Ok(()) => result.vacuumed = true,
                Err(e) => warn!(error = %e, "Vacuum failed"),
            }
        }

        result.duration_ms = duration_to_millis(start.elapsed());

        metrics::counter!(
            "prune_runs_total",
            "operation" => result.operation.clone(),
            "dry_run" => result.dry_run.to_string()
        )
        .increment(1);
        metrics::histogram!("prune_duration_ms", "operation" => result.operation.clone())
            .record(u64_to_f64(result.duration_ms));

        info!(
            operation = %result.operation,
            records_checked = result.records_checked(),
            versions_deleted = result.total_deleted(),
            rows_deleted = result.total_rows(),
            failed_types = result.types.iter().filter(|t| !t.is_ok()).count(),
            duration_ms = result.duration_ms,
            dry_run = result.dry_run,
            "Prune run completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyOverride, RetentionSettings, SettingValue};
    use crate::models::{Limit, LocationKey, VersionRecord};
    use crate::storage::SqliteVersionStore;

    fn page() -> TypeName {
        TypeName::from("Page")
    }

    fn blog() -> TypeName {
        TypeName::from("BlogPost")
    }

    fn store() -> Arc<SqliteVersionStore> {
        let store = SqliteVersionStore::in_memory(&page()).unwrap();
        store.register_type(&blog(), &page()).unwrap();
        Arc::new(store)
    }

    fn pruner(store: &Arc<SqliteVersionStore>) -> RetentionPruner<SqliteVersionStore> {
        RetentionPruner::new(Arc::clone(store), KeepsetConfig::default())
    }

    /// Writes `n` published versions, one second apart.
    fn publish_many(store: &SqliteVersionStore, id: i64, type_name: &TypeName, n: i64) {
        for v in 1..=n {
            store
                .write_version(&VersionRecord::published(
                    RecordId::new(id),
                    v,
                    1_000 + u64::try_from(v).unwrap(),
                    type_name,
                ))
                .unwrap();
        }
    }

    #[test]
    fn test_prune_record_keeps_newest_window() {
        let store = store();
        publish_many(&store, 1, &page(), 15);

        let outcome = pruner(&store)
            .prune_record(RecordId::new(1), false)
            .unwrap();

        assert_eq!(outcome.candidates, vec![5, 4, 3, 2, 1]);
        assert_eq!(outcome.rows_deleted, 5);
        let remaining: Vec<i64> = store
            .list_versions(RecordId::new(1))
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(remaining, (6..=15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let store = store();
        publish_many(&store, 1, &page(), 12);

        let outcome = pruner(&store).prune_record(RecordId::new(1), true).unwrap();

        assert_eq!(outcome.candidates.len(), 2);
        assert_eq!(outcome.rows_deleted, 0);
        assert_eq!(store.list_versions(RecordId::new(1)).unwrap().len(), 12);
    }

    #[test]
    fn test_missing_record_is_a_no_op() {
        let store = store();
        let outcome = pruner(&store).prune_record(RecordId::new(404), false).unwrap();
        assert!(outcome.type_name.is_none());
        assert!(outcome.candidates.is_empty());
    }

    #[test]
    fn test_subtype_rows_removed_from_every_table() {
        let store = store();
        publish_many(&store, 7, &blog(), 4);
        let policy = RetentionPolicy::live_only();

        let outcome = pruner(&store)
            .prune_record_with_policy(RecordId::new(7), &policy, false)
            .unwrap();

        assert_eq!(outcome.candidates, vec![3, 2, 1]);
        assert_eq!(outcome.rows_deleted, 6);
        for table in store.physical_tables_for(&blog()).unwrap() {
            assert_eq!(store.count_version_rows(&table, RecordId::new(7)).unwrap(), 1);
        }
    }

    #[test]
    fn test_old_type_slices_are_removed() {
        let store = store();
        let id = RecordId::new(3);
        publish_many(&store, 3, &blog(), 2);
        store
            .write_version(&VersionRecord::published(id, 3, 2_000, &page()))
            .unwrap();

        let outcome = pruner(&store).prune_record(id, false).unwrap();

        assert_eq!(outcome.old_type, 2);
        assert_eq!(outcome.candidates, vec![2, 1]);
        let blog_table = store.schema().version_tables(&blog()).unwrap()[0].clone();
        assert_eq!(store.count_version_rows(&blog_table, id).unwrap(), 0);
    }

    #[test]
    fn test_type_override_applies_to_subtype_records() {
        let store = store();
        publish_many(&store, 1, &page(), 6);
        publish_many(&store, 2, &blog(), 6);
        let settings = RetentionSettings::default().with_type(
            blog(),
            PolicyOverride {
                keep_versions: Some(SettingValue::Int(2)),
                ..PolicyOverride::default()
            },
        );
        let pruner = RetentionPruner::new(
            Arc::clone(&store),
            KeepsetConfig::default().with_retention(settings),
        );

        let result = pruner.prune_all(&[page()], false).unwrap();

        assert_eq!(result.total_deleted(), 4);
        assert_eq!(store.list_versions(RecordId::new(1)).unwrap().len(), 6);
        assert_eq!(store.list_versions(RecordId::new(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_config_error_skips_type_and_continues() {
        let store = store();
        publish_many(&store, 1, &page(), 12);
        publish_many(&store, 2, &blog(), 12);
        let settings = RetentionSettings::default().with_type(
            blog(),
            PolicyOverride {
                keep_versions: Some(SettingValue::Int(-1)),
                ..PolicyOverride::default()
            },
        );
        let pruner = RetentionPruner::new(
            Arc::clone(&store),
            KeepsetConfig::default().with_retention(settings),
        );

        let result = pruner.prune_all(&[blog(), page()], false).unwrap();

        let blog_outcome = result.for_type(&blog()).unwrap();
        assert!(blog_outcome.skipped_types[&blog()].contains("configuration error"));
        assert!(!blog_outcome.is_ok());
        assert_eq!(store.list_versions(RecordId::new(2)).unwrap().len(), 12);
        let page_outcome = result.for_type(&page()).unwrap();
        assert!(page_outcome.is_ok());
        assert_eq!(page_outcome.versions_deleted, 2);
    }

    #[test]
    fn test_config_error_on_subtype_skips_only_its_records() {
        let store = store();
        publish_many(&store, 1, &blog(), 12);
        publish_many(&store, 2, &page(), 12);
        let settings = RetentionSettings::default().with_type(
            blog(),
            PolicyOverride {
                keep_drafts: Some(SettingValue::Text("lots".to_string())),
                ..PolicyOverride::default()
            },
        );
        let pruner = RetentionPruner::new(
            Arc::clone(&store),
            KeepsetConfig::default().with_retention(settings),
        );

        let result = pruner.prune_all(&[page()], false).unwrap();

        let outcome = result.for_type(&page()).unwrap();
        assert!(outcome.error.is_none());
        assert_eq!(outcome.records_skipped, 1);
        assert_eq!(outcome.versions_deleted, 2);
        assert_eq!(store.list_versions(RecordId::new(1)).unwrap().len(), 12);
        assert_eq!(store.list_versions(RecordId::new(2)).unwrap().len(), 10);
    }

    #[test]
    fn test_records_reached_twice_are_pruned_once() {
        let store = store();
        publish_many(&store, 2, &blog(), 12);

        let result = pruner(&store).prune_all(&[blog(), page()], false).unwrap();

        assert_eq!(result.for_type(&blog()).unwrap().records_checked, 1);
        assert_eq!(result.for_type(&page()).unwrap().records_checked, 0);
    }

    #[test]
    fn test_empty_type_list_is_rejected() {
        let store = store();
        assert!(matches!(
            pruner(&store).prune_all(&[], false),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_reset_leaves_unpublished_records() {
        let store = store();
        publish_many(&store, 1, &page(), 5);
        for v in 1..=4 {
            store
                .write_version(&VersionRecord::draft(RecordId::new(2), v, 100, &page()))
                .unwrap();
        }

        let result = pruner(&store).reset_to_live_only(&[page()], false).unwrap();

        assert_eq!(result.total_deleted(), 4);
        assert_eq!(store.list_versions(RecordId::new(1)).unwrap().len(), 1);
        assert_eq!(store.list_versions(RecordId::new(2)).unwrap().len(), 4);
    }

    #[test]
    fn test_reset_keeps_newer_draft_head() {
        let store = store();
        let id = RecordId::new(1);
        publish_many(&store, 1, &page(), 3);
        store
            .write_version(&VersionRecord::draft(id, 4, 5_000, &page()).at(LocationKey::new(0, "x")))
            .unwrap();

        pruner(&store).reset_to_live_only(&[page()], false).unwrap();

        let remaining: Vec<i64> = store
            .list_versions(id)
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(remaining, vec![4, 3]);
    }

    #[test]
    fn test_orphans_purged_from_every_table() {
        let store = store();
        publish_many(&store, 9, &blog(), 3);
        publish_many(&store, 10, &page(), 2);
        store.delete_record(RecordId::new(9)).unwrap();

        let result = pruner(&store).prune_orphaned_versions(&page(), false).unwrap();

        assert_eq!(result.total_deleted(), 3);
        assert_eq!(result.total_rows(), 6);
        assert!(store.list_versions(RecordId::new(9)).unwrap().is_empty());
        assert_eq!(store.list_versions(RecordId::new(10)).unwrap().len(), 2);
    }

    #[test]
    fn test_purge_archived_respects_limit_and_order() {
        let store = store();
        for id in 1..=3 {
            store
                .write_version(&VersionRecord::published(
                    RecordId::new(id),
                    1,
                    u64::try_from(id).unwrap() * 10,
                    &page(),
                ))
                .unwrap();
            store.delete_record(RecordId::new(id)).unwrap();
        }

        let options = ArchivePurgeOptions::new(page()).with_limit(2);
        let result = pruner(&store).purge_archived(&options).unwrap();

        assert_eq!(result.records_checked(), 2);
        // newest edits go first, so the oldest archived record survives
        assert_eq!(store.list_versions(RecordId::new(1)).unwrap().len(), 1);
        assert!(store.list_versions(RecordId::new(3)).unwrap().is_empty());
    }

    #[test]
    fn test_archive_cutoff() {
        let options = ArchivePurgeOptions::new(page()).with_older_than_days(2);
        assert_eq!(options.cutoff(10 * SECONDS_PER_DAY), Some(8 * SECONDS_PER_DAY));
        assert_eq!(options.cutoff(0), Some(0));
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(ArchivePurgeOptions::new(page()).cutoff(100), None);
    }

    #[test]
    fn test_vacuum_after_batch_when_configured() {
        let store = store();
        publish_many(&store, 1, &page(), 3);
        let pruner = RetentionPruner::new(
            Arc::clone(&store),
            KeepsetConfig::default().with_vacuum_tables(true),
        );

        let result = pruner
            .prune_all_with_policy(&[page()], &RetentionPolicy::live_only(), false)
            .unwrap();
        assert!(result.vacuumed);

        let nothing_left = pruner
            .prune_all_with_policy(&[page()], &RetentionPolicy::live_only(), false)
            .unwrap();
        assert!(!nothing_left.vacuumed);
        assert_eq!(nothing_left.total_deleted(), 0);
    }

    #[test]
    fn test_disabled_limits_keep_all_history() {
        let store = store();
        publish_many(&store, 1, &page(), 30);
        let policy = RetentionPolicy::default()
            .with_keep_versions(Limit::Disabled)
            .with_keep_drafts(Limit::Disabled);

        let outcome = pruner(&store)
            .prune_record_with_policy(RecordId::new(1), &policy, false)
            .unwrap();

        assert!(outcome.candidates.is_empty());
    }
}

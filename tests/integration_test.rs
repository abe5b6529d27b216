//! Integration tests for keepset.
//!
//! Each test seeds an in-memory `SqliteVersionStore` through its public
//! write API and prunes through `RetentionPruner`.
#![allow(clippy::expect_used, clippy::unwrap_used, clippy::doc_markdown)]

use keepset::config::{KeepsetConfig, PolicyOverride, RetentionSettings, SettingValue};
use keepset::{
    ArchivePurgeOptions, Error, Limit, LocationKey, PublishHook, RecordId, RecordRef,
    RetentionPolicy, RetentionPruner, SqliteVersionStore, TableName, TypeName, TypeSchema,
    VersionRecord, VersionStore,
};
use std::sync::Arc;

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
    RetentionPruner::new(Arc::clone(store), KeepsetConfig::new())
}

fn edited(version: i64) -> u64 {
    u64::try_from(version).unwrap() * 10
}

fn publish(store: &SqliteVersionStore, id: i64, versions: std::ops::RangeInclusive<i64>, type_name: &TypeName) {
    for v in versions {
        store
            .write_version(&VersionRecord::published(RecordId::new(id), v, edited(v), type_name))
            .unwrap();
    }
}

fn draft(store: &SqliteVersionStore, id: i64, versions: std::ops::RangeInclusive<i64>, type_name: &TypeName) {
    for v in versions {
        store
            .write_version(&VersionRecord::draft(RecordId::new(id), v, edited(v), type_name))
            .unwrap();
    }
}

fn remaining(store: &SqliteVersionStore, id: i64) -> Vec<i64> {
    store
        .list_versions(RecordId::new(id))
        .unwrap()
        .iter()
        .map(|v| v.version)
        .collect()
}

fn published_only(keep: u32) -> RetentionPolicy {
    RetentionPolicy::default()
        .with_keep_versions(Limit::Keep(keep))
        .with_keep_drafts(Limit::Disabled)
        .with_keep_redirects(false)
}

#[test]
fn test_error_types() {
    let err = Error::Storage {
        operation: "delete_version_rows".to_string(),
        cause: "disk I/O error".to_string(),
    };
    let display = err.to_string();
    assert!(display.contains("delete_version_rows"));
    assert!(display.contains("disk I/O error"));

    let err = Error::Config("keep_versions must be a non-negative integer".to_string());
    assert!(err.to_string().contains("configuration error"));

    assert!(Error::RecordNotFound(RecordId::new(1)).is_benign());
    assert!(!Error::InvalidInput("x".to_string()).is_benign());
}

#[test]
fn test_window_keeps_newest_n_published() {
    let store = store();
    publish(&store, 1, 1..=15, &page());

    let outcome = pruner(&store)
        .prune_record_with_policy(RecordId::new(1), &published_only(10), false)
        .unwrap();

    assert_eq!(outcome.versions_removed(), 5);
    assert_eq!(outcome.rows_deleted, 5);
    assert_eq!(remaining(&store, 1), (6..=15).rev().collect::<Vec<_>>());
}

#[test]
fn test_second_prune_deletes_nothing() {
    let store = store();
    publish(&store, 1, 1..=12, &page());
    let pruner = pruner(&store);

    let first = pruner.prune_record(RecordId::new(1), false).unwrap();
    let second = pruner.prune_record(RecordId::new(1), false).unwrap();

    assert_eq!(first.versions_removed(), 2);
    assert_eq!(second.versions_removed(), 0);
    assert_eq!(second.rows_deleted, 0);
}

#[test]
fn test_redirects_keep_newest_version_per_location() {
    let store = store();
    let a = LocationKey::new(0, "about");
    let b = LocationKey::new(0, "about-us");
    // oldest -> newest: A, B, B, A, A
    for (v, key) in [(1, &a), (2, &b), (3, &b), (4, &a), (5, &a)] {
        store
            .write_version(
                &VersionRecord::published(RecordId::new(1), v, edited(v), &page()).at(key.clone()),
            )
            .unwrap();
    }
    let policy = published_only(1).with_keep_redirects(true);

    let outcome = pruner(&store)
        .prune_record_with_policy(RecordId::new(1), &policy, false)
        .unwrap();

    assert_eq!(outcome.candidates, vec![4, 2, 1]);
    assert_eq!(remaining(&store, 1), vec![5, 3]);
}

#[test]
fn test_old_type_rows_deleted_from_every_table() {
    let store = store();
    publish(&store, 1, 1..=2, &page());
    publish(&store, 1, 3..=4, &blog());

    let outcome = pruner(&store).prune_record(RecordId::new(1), false).unwrap();

    assert_eq!(outcome.type_name, Some(blog()));
    assert_eq!(outcome.old_type, 2);
    assert_eq!(outcome.candidates, vec![2, 1]);
    assert_eq!(remaining(&store, 1), vec![4, 3]);
    assert_eq!(
        store
            .count_version_rows(&TypeSchema::version_table(&page()), RecordId::new(1))
            .unwrap(),
        2
    );
    assert_eq!(
        store
            .count_version_rows(&TypeSchema::version_table(&blog()), RecordId::new(1))
            .unwrap(),
        2
    );
}

#[test]
fn test_keep_old_types_retains_foreign_rows() {
    let store = store();
    publish(&store, 1, 1..=2, &page());
    publish(&store, 1, 3..=4, &blog());
    let policy = RetentionPolicy::default().with_keep_old_types(true);

    let outcome = pruner(&store)
        .prune_record_with_policy(RecordId::new(1), &policy, false)
        .unwrap();

    assert_eq!(outcome.versions_removed(), 0);
    assert_eq!(remaining(&store, 1).len(), 4);
}

#[test]
fn test_drafts_and_published_are_independent() {
    let store = store();
    publish(&store, 1, 1..=20, &page());
    draft(&store, 1, 21..=23, &page());
    let policy = RetentionPolicy::default()
        .with_keep_versions(Limit::Keep(10))
        .with_keep_drafts(Limit::Keep(5));

    let outcome = pruner(&store)
        .prune_record_with_policy(RecordId::new(1), &policy, false)
        .unwrap();

    assert_eq!(outcome.drafts, 0);
    assert_eq!(outcome.published, 10);
    assert_eq!(remaining(&store, 1).len(), 13);
}

#[test]
fn test_reset_never_touches_live_or_draft_head() {
    let store = store();
    publish(&store, 1, 1..=3, &page());
    draft(&store, 1, 4..=5, &page());

    let result = pruner(&store).reset_to_live_only(&[page()], false).unwrap();

    assert_eq!(result.total_deleted(), 3);
    assert_eq!(remaining(&store, 1), vec![5, 3]);
    assert_eq!(store.live_version(RecordId::new(1)).unwrap(), Some(3));
    assert_eq!(store.draft_head(RecordId::new(1)).unwrap(), Some(5));
}

#[test]
fn test_reset_skips_unpublished_records() {
    let store = store();
    publish(&store, 1, 1..=3, &page());
    store.unpublish(RecordId::new(1)).unwrap();
    publish(&store, 2, 1..=3, &page());

    let result = pruner(&store).reset_to_live_only(&[page()], false).unwrap();

    assert_eq!(result.records_checked(), 1);
    assert_eq!(remaining(&store, 1), vec![3, 2, 1]);
    assert_eq!(remaining(&store, 2), vec![3]);
}

#[test]
fn test_prune_all_uses_configured_policy_per_type() {
    let store = store();
    publish(&store, 1, 1..=12, &page());
    publish(&store, 2, 1..=12, &blog());
    let retention = RetentionSettings::default().with_type(
        blog(),
        PolicyOverride {
            keep_versions: Some(SettingValue::Int(4)),
            ..PolicyOverride::default()
        },
    );
    let pruner = RetentionPruner::new(
        Arc::clone(&store),
        KeepsetConfig::new().with_retention(retention),
    );

    let result = pruner.prune_all(&[page(), blog()], false).unwrap();

    assert!(!result.has_errors());
    assert_eq!(remaining(&store, 1).len(), 10);
    assert_eq!(remaining(&store, 2).len(), 4);
    // BlogPost records are reached through Page first and pruned once
    assert_eq!(result.for_type(&page()).unwrap().records_checked, 2);
    assert_eq!(result.for_type(&blog()).unwrap().records_checked, 0);
    assert_eq!(result.total_deleted(), 2 + 8);
}

#[test]
fn test_malformed_policy_fails_closed() {
    let store = store();
    publish(&store, 1, 1..=12, &page());
    publish(&store, 2, 1..=12, &blog());
    let retention = RetentionSettings::default().with_type(
        blog(),
        PolicyOverride {
            keep_versions: Some(SettingValue::Int(-1)),
            ..PolicyOverride::default()
        },
    );
    let pruner = RetentionPruner::new(
        Arc::clone(&store),
        KeepsetConfig::new().with_retention(retention),
    );

    let result = pruner.prune_all(&[blog()], false).unwrap();

    assert!(result.has_errors());
    let outcome = result.for_type(&blog()).unwrap();
    assert!(outcome.error.is_none());
    assert!(outcome.skipped_types[&blog()].contains("retention.types.BlogPost"));
    assert_eq!(outcome.records_skipped, 1);
    assert_eq!(remaining(&store, 2).len(), 12);
    assert_eq!(remaining(&store, 1).len(), 12);
}

#[test]
fn test_malformed_subtype_policy_does_not_stop_parent_type() {
    let store = store();
    // the BlogPost record is listed before the Page record
    publish(&store, 1, 1..=12, &blog());
    publish(&store, 2, 1..=12, &page());
    publish(&store, 3, 1..=12, &blog());
    let retention = RetentionSettings::default().with_type(
        blog(),
        PolicyOverride {
            keep_versions: Some(SettingValue::Int(-1)),
            ..PolicyOverride::default()
        },
    );
    let pruner = RetentionPruner::new(
        Arc::clone(&store),
        KeepsetConfig::new().with_retention(retention),
    );

    let result = pruner.prune_all(&[page()], false).unwrap();

    let outcome = result.for_type(&page()).unwrap();
    assert!(outcome.error.is_none());
    assert_eq!(outcome.records_checked, 3);
    assert_eq!(outcome.records_skipped, 2);
    assert_eq!(outcome.skipped_types.len(), 1);
    assert!(outcome.skipped_types.contains_key(&blog()));
    assert!(result.has_errors());
    assert_eq!(remaining(&store, 1).len(), 12);
    assert_eq!(remaining(&store, 2).len(), 10);
    assert_eq!(remaining(&store, 3).len(), 12);
}

#[test]
fn test_unknown_type_does_not_stop_later_types() {
    let store = store();
    publish(&store, 1, 1..=11, &page());

    let result = pruner(&store)
        .prune_all(&[TypeName::from("Missing"), page()], false)
        .unwrap();

    assert!(result.for_type(&TypeName::from("Missing")).unwrap().error.is_some());
    assert!(result.for_type(&page()).unwrap().is_ok());
    assert_eq!(result.total_deleted(), 1);
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
fn test_missing_record_is_a_no_op() {
    let store = store();
    let outcome = pruner(&store).prune_record(RecordId::new(404), false).unwrap();
    assert_eq!(outcome.type_name, None);
    assert_eq!(outcome.versions_removed(), 0);
}

#[test]
fn test_dry_run_changes_nothing() {
    let store = store();
    publish(&store, 1, 1..=15, &page());

    let result = pruner(&store).prune_all(&[page()], true).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.total_deleted(), 5);
    assert_eq!(result.total_rows(), 0);
    assert_eq!(remaining(&store, 1).len(), 15);
}

#[test]
fn test_orphaned_versions_removed_but_unpublished_kept() {
    let store = store();
    publish(&store, 1, 1..=3, &blog());
    store.delete_record(RecordId::new(1)).unwrap();
    publish(&store, 2, 1..=3, &page());
    store.unpublish(RecordId::new(2)).unwrap();

    let result = pruner(&store).prune_orphaned_versions(&page(), false).unwrap();

    assert_eq!(result.total_deleted(), 3);
    // three versions in Page_Versions and BlogPost_Versions each
    assert_eq!(result.total_rows(), 6);
    assert!(remaining(&store, 1).is_empty());
    assert_eq!(remaining(&store, 2).len(), 3);
}

#[test]
fn test_purge_archived_respects_limit_and_age() {
    let store = store();
    // record 1 last edited at 30, record 2 at 60, record 3 at 90
    for id in 1..=3 {
        publish(&store, id, 1..=id * 3, &page());
        store.delete_record(RecordId::new(id)).unwrap();
    }
    let pruner = pruner(&store);

    let limited = pruner
        .purge_archived(&ArchivePurgeOptions::new(page()).with_limit(1))
        .unwrap();
    assert_eq!(limited.records_checked(), 1);
    assert!(remaining(&store, 3).is_empty());
    assert_eq!(remaining(&store, 1).len(), 3);

    let rest = pruner.purge_archived(&ArchivePurgeOptions::new(page())).unwrap();
    assert_eq!(rest.records_checked(), 2);
    assert!(remaining(&store, 1).is_empty());
}

#[test]
fn test_publish_hook_prunes_after_publish() {
    let store = store();
    let pruner = Arc::new(RetentionPruner::new(
        Arc::clone(&store),
        KeepsetConfig::new().with_retention(RetentionSettings {
            defaults: PolicyOverride {
                keep_versions: Some(SettingValue::Int(2)),
                ..PolicyOverride::default()
            },
            ..RetentionSettings::default()
        }),
    ));
    let hook = PublishHook::new(Arc::clone(&pruner));

    publish(&store, 7, 1..=5, &page());
    let outcome = hook.on_publish(RecordId::new(7)).unwrap();

    assert_eq!(outcome.candidates, vec![3, 2, 1]);
    assert_eq!(remaining(&store, 7), vec![5, 4]);
}

#[test]
fn test_on_disk_store_with_vacuum() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.db");
    let store = Arc::new(SqliteVersionStore::open(&path, &page()).unwrap());
    publish(&store, 1, 1..=14, &page());
    let pruner = RetentionPruner::new(
        Arc::clone(&store),
        KeepsetConfig::new().with_database(&path).with_vacuum_tables(true),
    );

    let result = pruner.prune_all(&[page()], false).unwrap();
    assert!(result.vacuumed);
    assert_eq!(result.total_rows(), 4);
    drop(pruner);
    drop(store);

    let reopened = SqliteVersionStore::open(&path, &page()).unwrap();
    assert_eq!(remaining(&reopened, 1).len(), 10);
}

/// Delegates to SQLite but fails row deletes on one table for one record.
struct FailingDeletes {
    inner: Arc<SqliteVersionStore>,
    table: TableName,
    record_id: RecordId,
}

impl VersionStore for FailingDeletes {
    fn list_versions(&self, record_id: RecordId) -> keepset::Result<Vec<VersionRecord>> {
        self.inner.list_versions(record_id)
    }

    fn physical_tables_for(&self, type_name: &TypeName) -> keepset::Result<Vec<TableName>> {
        self.inner.physical_tables_for(type_name)
    }

    fn type_ancestry(&self, type_name: &TypeName) -> keepset::Result<Vec<TypeName>> {
        self.inner.type_ancestry(type_name)
    }

    fn current_type(&self, record_id: RecordId) -> keepset::Result<Option<TypeName>> {
        self.inner.current_type(record_id)
    }

    fn live_version(&self, record_id: RecordId) -> keepset::Result<Option<i64>> {
        self.inner.live_version(record_id)
    }

    fn draft_head(&self, record_id: RecordId) -> keepset::Result<Option<i64>> {
        self.inner.draft_head(record_id)
    }

    fn delete_version_rows(
        &self,
        table: &TableName,
        record_id: RecordId,
        versions: &[i64],
    ) -> keepset::Result<usize> {
        if *table == self.table && record_id == self.record_id {
            return Err(Error::storage("delete_version_rows", "disk I/O error"));
        }
        self.inner.delete_version_rows(table, record_id, versions)
    }

    fn delete_all_version_rows(&self, table: &TableName, record_id: RecordId) -> keepset::Result<usize> {
        self.inner.delete_all_version_rows(table, record_id)
    }

    fn list_live_records(&self, type_name: &TypeName) -> keepset::Result<Vec<RecordRef>> {
        self.inner.list_live_records(type_name)
    }

    fn list_orphaned_records(
        &self,
        type_name: &TypeName,
        edited_before: Option<u64>,
    ) -> keepset::Result<Vec<RecordId>> {
        self.inner.list_orphaned_records(type_name, edited_before)
    }
}

fn news() -> TypeName {
    TypeName::from("NewsPage")
}

/// Record 7 is a `BlogPost`, record 8 a `NewsPage`; deletes of record 7
/// from the base table fail.
fn failing_base_table() -> (Arc<SqliteVersionStore>, RetentionPruner<FailingDeletes>) {
    let store = store();
    store.register_type(&news(), &page()).unwrap();
    publish(&store, 7, 1..=12, &blog());
    publish(&store, 8, 1..=12, &news());
    let failing = FailingDeletes {
        inner: Arc::clone(&store),
        table: TypeSchema::version_table(&page()),
        record_id: RecordId::new(7),
    };
    (store, RetentionPruner::new(Arc::new(failing), KeepsetConfig::new()))
}

#[test]
fn test_storage_error_keeps_deletes_already_applied() {
    let (store, failing_pruner) = failing_base_table();
    let id = RecordId::new(7);

    let err = failing_pruner.prune_record(id, false).unwrap_err();

    assert!(matches!(err, Error::Storage { .. }));
    assert!(err.to_string().contains("disk I/O error"));
    // the subtype table is deleted before the base table and stays pruned
    assert_eq!(
        store.count_version_rows(&TypeSchema::version_table(&blog()), id).unwrap(),
        10
    );
    assert_eq!(
        store.count_version_rows(&TypeSchema::version_table(&page()), id).unwrap(),
        12
    );

    // a retry against healthy storage finishes the job
    let retried = pruner(&store).prune_record(id, false).unwrap();
    assert_eq!(retried.rows_deleted, 2);
    assert_eq!(remaining(&store, 7).len(), 10);
}

#[test]
fn test_storage_error_stops_type_and_later_types_run() {
    let (store, pruner) = failing_base_table();

    let result = pruner.prune_all(&[blog(), news()], false).unwrap();

    let failed = result.for_type(&blog()).unwrap();
    assert!(failed.error.as_deref().unwrap().contains("disk I/O error"));
    assert!(failed.skipped_types.is_empty());
    let next = result.for_type(&news()).unwrap();
    assert!(next.is_ok());
    assert_eq!(next.rows_deleted, 4);
    assert_eq!(remaining(&store, 8).len(), 10);
    assert!(result.has_errors());
}

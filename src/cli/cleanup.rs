//! `orphans` and `archived` commands.

use super::{OutputFormat, write_batch};
use crate::Result;
use crate::models::TypeName;
use crate::prune::{ArchivePurgeOptions, RetentionPruner};
use crate::storage::VersionStore;
use std::io::Write;

/// Deletes version rows of records that were hard-deleted.
///
/// Returns `true` if the run completed.
///
/// # Errors
///
/// Returns an error if the orphan query or output fails.
pub fn cmd_orphans<S: VersionStore, W: Write>(
    pruner: &RetentionPruner<S>,
    type_name: &TypeName,
    dry_run: bool,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let result = pruner.prune_orphaned_versions(type_name, dry_run)?;
    write_batch(writer, &result, format)?;
    Ok(!result.has_errors())
}

/// Purges archived records.
///
/// Returns `true` if the run completed.
///
/// # Errors
///
/// Returns an error if the archive query or output fails.
pub fn cmd_archived<S: VersionStore, W: Write>(
    pruner: &RetentionPruner<S>,
    options: &ArchivePurgeOptions,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let result = pruner.purge_archived(options)?;
    write_batch(writer, &result, format)?;
    Ok(!result.has_errors())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeepsetConfig;
    use crate::models::{RecordId, VersionRecord};
    use crate::storage::SqliteVersionStore;
    use std::sync::Arc;

    fn pruner_with_deleted_records(count: i64) -> RetentionPruner<SqliteVersionStore> {
        let page = TypeName::from("Page");
        let store = SqliteVersionStore::in_memory(&page).unwrap();
        for id in 1..=count {
            for v in 1..=2 {
                store
                    .write_version(&VersionRecord::published(RecordId::new(id), v, 10, &page))
                    .unwrap();
            }
            store.delete_record(RecordId::new(id)).unwrap();
        }
        RetentionPruner::new(Arc::new(store), KeepsetConfig::default())
    }

    #[test]
    fn test_cmd_orphans() {
        let pruner = pruner_with_deleted_records(2);
        let mut out = Vec::new();

        let ok = cmd_orphans(&pruner, &TypeName::from("Page"), false, OutputFormat::Text, &mut out)
            .unwrap();

        assert!(ok);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Page: deleted 4 rows for 4 versions from 2 of 2 records"));
    }

    #[test]
    fn test_cmd_archived_with_limit() {
        let pruner = pruner_with_deleted_records(3);
        let options = ArchivePurgeOptions::new(TypeName::from("Page"))
            .with_limit(1)
            .with_dry_run(true);
        let mut out = Vec::new();

        cmd_archived(&pruner, &options, OutputFormat::Json, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["operation"], "archived");
        assert_eq!(value["types"][0]["records_checked"], 1);
        assert_eq!(value["types"][0]["versions_deleted"], 2);
    }
}

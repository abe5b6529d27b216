//! `prune`, `reset` and `record` commands.

use super::{OutputFormat, output_error, write_batch, write_json};
use crate::Result;
use crate::models::{RecordId, TypeName};
use crate::prune::RetentionPruner;
use crate::storage::VersionStore;
use std::io::Write;

/// Prunes every live record of `types` with the configured policies.
///
/// Returns `true` if every type completed.
///
/// # Errors
///
/// Returns an error if no types are given or output fails.
pub fn cmd_prune<S: VersionStore, W: Write>(
    pruner: &RetentionPruner<S>,
    types: &[TypeName],
    dry_run: bool,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let result = pruner.prune_all(types, dry_run)?;
    write_batch(writer, &result, format)?;
    Ok(!result.has_errors())
}

/// Resets every live record of `types` to its live version and draft head.
///
/// Returns `true` if every type completed.
///
/// # Errors
///
/// Returns an error if no types are given or output fails.
pub fn cmd_reset<S: VersionStore, W: Write>(
    pruner: &RetentionPruner<S>,
    types: &[TypeName],
    dry_run: bool,
    format: OutputFormat,
    writer: &mut W,
) -> Result<bool> {
    let result = pruner.reset_to_live_only(types, dry_run)?;
    write_batch(writer, &result, format)?;
    Ok(!result.has_errors())
}

/// Prunes a single record.
///
/// # Errors
///
/// Returns an error if the prune or output fails.
pub fn cmd_record<S: VersionStore, W: Write>(
    pruner: &RetentionPruner<S>,
    record_id: RecordId,
    dry_run: bool,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    let outcome = pruner.prune_record(record_id, dry_run)?;
    match format {
        OutputFormat::Json => write_json(writer, &outcome),
        OutputFormat::Text => writeln!(writer, "{}", outcome.summary()).map_err(output_error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeepsetConfig;
    use crate::models::VersionRecord;
    use crate::storage::SqliteVersionStore;
    use std::sync::Arc;

    fn pruner_with(versions: i64) -> RetentionPruner<SqliteVersionStore> {
        let page = TypeName::from("Page");
        let store = SqliteVersionStore::in_memory(&page).unwrap();
        for v in 1..=versions {
            store
                .write_version(&VersionRecord::published(RecordId::new(1), v, v.unsigned_abs(), &page))
                .unwrap();
        }
        RetentionPruner::new(Arc::new(store), KeepsetConfig::default())
    }

    #[test]
    fn test_cmd_prune_text() {
        let pruner = pruner_with(13);
        let mut out = Vec::new();

        let ok = cmd_prune(&pruner, &[TypeName::from("Page")], false, OutputFormat::Text, &mut out)
            .unwrap();

        assert!(ok);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Page: deleted 3 rows for 3 versions from 1 of 1 records"));
    }

    #[test]
    fn test_cmd_prune_reports_failed_type() {
        let pruner = pruner_with(1);
        let mut out = Vec::new();

        let ok = cmd_prune(&pruner, &[TypeName::from("Nope")], false, OutputFormat::Text, &mut out)
            .unwrap();

        assert!(!ok);
        assert!(String::from_utf8(out).unwrap().contains("stopped"));
    }

    #[test]
    fn test_cmd_reset_dry_run() {
        let pruner = pruner_with(4);
        let mut out = Vec::new();

        cmd_reset(&pruner, &[TypeName::from("Page")], true, OutputFormat::Text, &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().contains("would delete 3 versions"));
        assert_eq!(pruner.store().list_versions(RecordId::new(1)).unwrap().len(), 4);
    }

    #[test]
    fn test_cmd_record_json() {
        let pruner = pruner_with(11);
        let mut out = Vec::new();

        cmd_record(&pruner, RecordId::new(1), false, OutputFormat::Json, &mut out).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["candidates"], serde_json::json!([1]));
        assert_eq!(value["rows_deleted"], 1);
    }
}

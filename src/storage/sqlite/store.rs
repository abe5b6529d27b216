//! `SQLite` implementation of [`VersionStore`].

use super::connection::{acquire_lock, open_connection, open_in_memory};
use super::metrics::timed;
use super::schema::{TYPES_TABLE, TypeSchema, quote};
use crate::models::{LocationKey, RecordId, RecordRef, TableName, TypeName, VersionRecord};
use crate::storage::traits::VersionStore;
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Maximum versions bound into a single `IN (...)` list.
const DELETE_CHUNK: usize = 500;

/// Maps a rusqlite error into [`Error::Storage`].
fn storage_err(operation: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| Error::storage(operation, e)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

struct Inner {
    conn: Connection,
    schema: TypeSchema,
}

/// Version store backed by a single `SQLite` database.
///
/// Serves one type hierarchy rooted at a base type; see
/// [`TypeSchema`] for the table layout.
pub struct SqliteVersionStore {
    inner: Mutex<Inner>,
    db_path: Option<PathBuf>,
}

impl SqliteVersionStore {
    /// Opens (or creates) a store for the hierarchy rooted at `base`.
    ///
    /// Types registered by earlier runs are loaded from the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(db_path: impl Into<PathBuf>, base: &TypeName) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        let store = Self::initialize(conn, base, Some(db_path))?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(base: &TypeName) -> Result<Self> {
        let conn = open_in_memory()?;
        Self::initialize(conn, base, None)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns a copy of the registered hierarchy.
    #[must_use]
    pub fn schema(&self) -> TypeSchema {
        acquire_lock(&self.inner).schema.clone()
    }

    fn initialize(conn: Connection, base: &TypeName, db_path: Option<PathBuf>) -> Result<Self> {
        let mut schema = TypeSchema::new(base.clone())?;

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TYPES_TABLE} (
                name TEXT PRIMARY KEY,
                parent TEXT
            );"
        ))
        .map_err(storage_err("create_types_table"))?;
        conn.execute_batch(&schema.base_ddl())
            .map_err(storage_err("create_base_tables"))?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO {TYPES_TABLE} (name, parent) VALUES (?1, NULL)"),
            params![base.as_str()],
        )
        .map_err(storage_err("register_base_type"))?;

        // Parents are always registered before children, so rowid order
        // reproduces a valid registration order.
        let registered: Vec<(String, Option<String>)> = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT name, parent FROM {TYPES_TABLE} ORDER BY rowid"
                ))
                .map_err(storage_err("load_types"))?;
            stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .map_err(storage_err("load_types"))?
                .collect::<std::result::Result<_, _>>()
                .map_err(storage_err("load_types"))?
        };
        for (name, parent) in registered {
            if let Some(parent) = parent.map(TypeName::from) {
                if schema.contains(&parent) {
                    schema.register(TypeName::from(name), &parent)?;
                }
            }
        }

        debug!(base = %base, types = schema.descendants_or_self(base).len(), "Opened version store");

        Ok(Self {
            inner: Mutex::new(Inner { conn, schema }),
            db_path,
        })
    }

    /// Registers a subtype and creates its version table.
    ///
    /// # Errors
    ///
    /// Returns an error if the type name is invalid, the parent is unknown,
    /// or the table cannot be created.
    pub fn register_type(&self, type_name: &TypeName, parent: &TypeName) -> Result<()> {
        let mut inner = acquire_lock(&self.inner);
        let mut schema = inner.schema.clone();
        if !schema.register(type_name.clone(), parent)? {
            return Ok(());
        }
        inner
            .conn
            .execute_batch(&TypeSchema::subtype_ddl(type_name))
            .map_err(storage_err("register_type"))?;
        inner
            .conn
            .execute(
                &format!("INSERT OR IGNORE INTO {TYPES_TABLE} (name, parent) VALUES (?1, ?2)"),
                params![type_name.as_str(), parent.as_str()],
            )
            .map_err(storage_err("register_type"))?;
        inner.schema = schema;
        debug!(type_name = %type_name, parent = %parent, "Registered type");
        Ok(())
    }

    /// Appends a version row and moves the record's draft head to it.
    ///
    /// The row is written to the version table of every type in the
    /// version's ancestry. A published version also becomes the live version.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or a write fails.
    #[instrument(skip(self, version), fields(record_id = %version.record_id, version = version.version))]
    pub fn write_version(&self, version: &VersionRecord) -> Result<()> {
        timed("write_version", || {
            let mut inner = acquire_lock(&self.inner);
            let tables = inner.schema.version_tables(&version.type_name)?;
            let records = quote(&inner.schema.records_table());
            let live = quote(&inner.schema.live_table());
            let base_versions = inner.schema.base_versions_table();

            let (parent_id, segment) = version
                .location_key
                .as_ref()
                .map_or((None, None), |k| (Some(k.parent_id), Some(k.segment.clone())));
            let record_id = version.record_id.get();

            let tx = inner
                .conn
                .transaction()
                .map_err(storage_err("write_version"))?;
            for table in &tables {
                let inserted = if *table == base_versions {
                    tx.execute(
                        &format!(
                            "INSERT INTO {} (record_id, version, last_edited, was_published, type_name, parent_id, segment)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                            quote(table)
                        ),
                        params![
                            record_id,
                            version.version,
                            to_i64(version.last_edited),
                            version.was_published,
                            version.type_name.as_str(),
                            parent_id,
                            segment,
                        ],
                    )
                } else {
                    tx.execute(
                        &format!(
                            "INSERT INTO {} (record_id, version) VALUES (?1, ?2)",
                            quote(table)
                        ),
                        params![record_id, version.version],
                    )
                };
                inserted.map_err(storage_err("write_version"))?;
            }

            tx.execute(
                &format!(
                    "INSERT INTO {records} (id, type_name, version, parent_id, segment)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET
                        type_name = excluded.type_name,
                        version = excluded.version,
                        parent_id = excluded.parent_id,
                        segment = excluded.segment"
                ),
                params![
                    record_id,
                    version.type_name.as_str(),
                    version.version,
                    parent_id,
                    segment,
                ],
            )
            .map_err(storage_err("write_version"))?;

            if version.was_published {
                tx.execute(
                    &format!(
                        "INSERT INTO {live} (id, type_name, version) VALUES (?1, ?2, ?3)
                         ON CONFLICT(id) DO UPDATE SET
                            type_name = excluded.type_name,
                            version = excluded.version"
                    ),
                    params![record_id, version.type_name.as_str(), version.version],
                )
                .map_err(storage_err("write_version"))?;
            }

            tx.commit().map_err(storage_err("write_version"))
        })
    }

    /// Removes a record from the live table, leaving its draft in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn unpublish(&self, record_id: RecordId) -> Result<bool> {
        timed("unpublish", || {
            let inner = acquire_lock(&self.inner);
            let live = quote(&inner.schema.live_table());
            let removed = inner
                .conn
                .execute(
                    &format!("DELETE FROM {live} WHERE id = ?1"),
                    params![record_id.get()],
                )
                .map_err(storage_err("unpublish"))?;
            Ok(removed > 0)
        })
    }

    /// Hard-deletes a record from the current-state and live tables.
    ///
    /// Its version rows are left behind, which is what makes them orphans.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails.
    pub fn delete_record(&self, record_id: RecordId) -> Result<bool> {
        timed("delete_record", || {
            let inner = acquire_lock(&self.inner);
            let records = quote(&inner.schema.records_table());
            let live = quote(&inner.schema.live_table());
            let mut removed = 0;
            for table in [records, live] {
                removed += inner
                    .conn
                    .execute(
                        &format!("DELETE FROM {table} WHERE id = ?1"),
                        params![record_id.get()],
                    )
                    .map_err(storage_err("delete_record"))?;
            }
            Ok(removed > 0)
        })
    }

    /// Counts the rows of one version table belonging to a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not belong to this hierarchy or the
    /// query fails.
    pub fn count_version_rows(&self, table: &TableName, record_id: RecordId) -> Result<usize> {
        let inner = acquire_lock(&self.inner);
        ensure_owned(&inner.schema, table)?;
        let count: i64 = inner
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE record_id = ?1", quote(table)),
                params![record_id.get()],
                |row| row.get(0),
            )
            .map_err(storage_err("count_version_rows"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn ensure_owned(schema: &TypeSchema, table: &TableName) -> Result<()> {
    if schema.owns_version_table(table) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "table '{table}' is not a version table of '{}'",
            schema.base()
        )))
    }
}

fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRecord> {
    let parent_id: Option<i64> = row.get(5)?;
    let segment: Option<String> = row.get(6)?;
    let location_key = match (parent_id, segment) {
        (Some(parent_id), Some(segment)) => Some(LocationKey { parent_id, segment }),
        _ => None,
    };
    Ok(VersionRecord {
        record_id: RecordId::new(row.get(0)?),
        version: row.get(1)?,
        last_edited: to_u64(row.get(2)?),
        was_published: row.get(3)?,
        type_name: TypeName::new(row.get::<_, String>(4)?),
        location_key,
    })
}

impl VersionStore for SqliteVersionStore {
    #[instrument(skip(self), fields(record_id = %record_id))]
    fn list_versions(&self, record_id: RecordId) -> Result<Vec<VersionRecord>> {
        timed("list_versions", || {
            let inner = acquire_lock(&self.inner);
            let versions = quote(&inner.schema.base_versions_table());
            let mut stmt = inner
                .conn
                .prepare(&format!(
                    "SELECT record_id, version, last_edited, was_published, type_name, parent_id, segment
                     FROM {versions}
                     WHERE record_id = ?1
                     ORDER BY last_edited DESC, version DESC"
                ))
                .map_err(storage_err("list_versions"))?;
            let rows = stmt
                .query_map(params![record_id.get()], row_to_version)
                .map_err(storage_err("list_versions"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage_err("list_versions"))?;
            Ok(rows)
        })
    }

    fn physical_tables_for(&self, type_name: &TypeName) -> Result<Vec<TableName>> {
        acquire_lock(&self.inner).schema.version_tables(type_name)
    }

    fn type_ancestry(&self, type_name: &TypeName) -> Result<Vec<TypeName>> {
        acquire_lock(&self.inner).schema.ancestry(type_name)
    }

    fn current_type(&self, record_id: RecordId) -> Result<Option<TypeName>> {
        timed("current_type", || {
            let inner = acquire_lock(&self.inner);
            let records = quote(&inner.schema.records_table());
            let live = quote(&inner.schema.live_table());
            let stage: Option<String> = inner
                .conn
                .query_row(
                    &format!("SELECT type_name FROM {records} WHERE id = ?1"),
                    params![record_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("current_type"))?;
            if let Some(name) = stage {
                return Ok(Some(TypeName::new(name)));
            }
            let published: Option<String> = inner
                .conn
                .query_row(
                    &format!("SELECT type_name FROM {live} WHERE id = ?1"),
                    params![record_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("current_type"))?;
            Ok(published.map(TypeName::new))
        })
    }

    fn live_version(&self, record_id: RecordId) -> Result<Option<i64>> {
        timed("live_version", || {
            let inner = acquire_lock(&self.inner);
            let live = quote(&inner.schema.live_table());
            inner
                .conn
                .query_row(
                    &format!("SELECT version FROM {live} WHERE id = ?1"),
                    params![record_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("live_version"))
        })
    }

    fn draft_head(&self, record_id: RecordId) -> Result<Option<i64>> {
        timed("draft_head", || {
            let inner = acquire_lock(&self.inner);
            let records = quote(&inner.schema.records_table());
            inner
                .conn
                .query_row(
                    &format!("SELECT version FROM {records} WHERE id = ?1"),
                    params![record_id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage_err("draft_head"))
        })
    }

    #[instrument(skip(self, versions), fields(table = %table, record_id = %record_id, versions = versions.len()))]
    fn delete_version_rows(
        &self,
        table: &TableName,
        record_id: RecordId,
        versions: &[i64],
    ) -> Result<usize> {
        if versions.is_empty() {
            return Ok(0);
        }
        timed("delete_version_rows", || {
            let inner = acquire_lock(&self.inner);
            ensure_owned(&inner.schema, table)?;
            let mut deleted = 0;
            for chunk in versions.chunks(DELETE_CHUNK) {
                let placeholders = (0..chunk.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "DELETE FROM {} WHERE record_id = ?1 AND version IN ({placeholders})",
                    quote(table)
                );
                let params = std::iter::once(record_id.get()).chain(chunk.iter().copied());
                deleted += inner
                    .conn
                    .execute(&sql, params_from_iter(params))
                    .map_err(storage_err("delete_version_rows"))?;
            }
            Ok(deleted)
        })
    }

    #[instrument(skip(self), fields(table = %table, record_id = %record_id))]
    fn delete_all_version_rows(&self, table: &TableName, record_id: RecordId) -> Result<usize> {
        timed("delete_all_version_rows", || {
            let inner = acquire_lock(&self.inner);
            ensure_owned(&inner.schema, table)?;
            inner
                .conn
                .execute(
                    &format!("DELETE FROM {} WHERE record_id = ?1", quote(table)),
                    params![record_id.get()],
                )
                .map_err(storage_err("delete_all_version_rows"))
        })
    }

    fn list_live_records(&self, type_name: &TypeName) -> Result<Vec<RecordRef>> {
        timed("list_live_records", || {
            let inner = acquire_lock(&self.inner);
            inner.schema.ancestry(type_name)?;
            let wanted = inner.schema.descendants_or_self(type_name);
            let records = quote(&inner.schema.records_table());
            let live = quote(&inner.schema.live_table());
            let mut stmt = inner
                .conn
                .prepare(&format!(
                    "SELECT l.id, COALESCE(r.type_name, l.type_name)
                     FROM {live} l
                     LEFT JOIN {records} r ON r.id = l.id
                     ORDER BY l.id"
                ))
                .map_err(storage_err("list_live_records"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RecordRef::new(
                        RecordId::new(row.get(0)?),
                        TypeName::new(row.get::<_, String>(1)?),
                    ))
                })
                .map_err(storage_err("list_live_records"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage_err("list_live_records"))?;
            Ok(rows
                .into_iter()
                .filter(|r| wanted.contains(&r.type_name))
                .collect())
        })
    }

    fn list_orphaned_records(
        &self,
        type_name: &TypeName,
        edited_before: Option<u64>,
    ) -> Result<Vec<RecordId>> {
        timed("list_orphaned_records", || {
            let inner = acquire_lock(&self.inner);
            inner.schema.ancestry(type_name)?;
            let wanted = inner.schema.descendants_or_self(type_name);
            let records = quote(&inner.schema.records_table());
            let live = quote(&inner.schema.live_table());
            let versions = quote(&inner.schema.base_versions_table());
            let mut stmt = inner
                .conn
                .prepare(&format!(
                    "SELECT v.record_id, v.last_edited, v.version, v.type_name
                     FROM {versions} v
                     LEFT JOIN {records} r ON r.id = v.record_id
                     LEFT JOIN {live} l ON l.id = v.record_id
                     WHERE r.id IS NULL AND l.id IS NULL"
                ))
                .map_err(storage_err("list_orphaned_records"))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        to_u64(row.get(1)?),
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(storage_err("list_orphaned_records"))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(storage_err("list_orphaned_records"))?;

            // newest (last_edited, version, type) per record
            let mut newest: BTreeMap<i64, (u64, i64, String)> = BTreeMap::new();
            for (id, edited, version, type_name) in rows {
                let entry = newest
                    .entry(id)
                    .or_insert_with(|| (edited, version, type_name.clone()));
                if (edited, version) > (entry.0, entry.1) {
                    *entry = (edited, version, type_name);
                }
            }

            let mut orphans: Vec<(u64, i64)> = newest
                .into_iter()
                .filter(|(_, (_, _, t))| wanted.contains(&TypeName::new(t.as_str())))
                .filter(|(_, (edited, _, _))| edited_before.is_none_or(|cutoff| *edited < cutoff))
                .map(|(id, (edited, _, _))| (edited, id))
                .collect();
            orphans.sort_by(|a, b| b.cmp(a));
            Ok(orphans
                .into_iter()
                .map(|(_, id)| RecordId::new(id))
                .collect())
        })
    }

    fn vacuum(&self, tables: &[TableName]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let distinct: BTreeSet<&TableName> = tables.iter().collect();
        timed("vacuum", || {
            let inner = acquire_lock(&self.inner);
            // SQLite compacts the whole file; there is no per-table VACUUM
            inner
                .conn
                .execute_batch("VACUUM")
                .map_err(storage_err("vacuum"))?;
            debug!(tables = distinct.len(), "Vacuumed database");
            Ok(())
        })
    }
}

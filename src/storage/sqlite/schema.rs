//! Type hierarchy and table layout for the `SQLite` version store.
//!
//! One store serves one hierarchy rooted at a base type. For a base type `B`
//! with a subtype `S` the layout is:
//!
//! | Table | Rows |
//! |-------|------|
//! | `B` | current (draft) state: id, type, draft head version, location |
//! | `B_Live` | published state: id, type, live version |
//! | `B_Versions` | one row per version with all retention metadata |
//! | `S_Versions` | the subtype's slice of each version (record id, version, payload) |
//!
//! Table names are interpolated into SQL, so every type name is validated as
//! a plain identifier before it is registered.

use crate::models::{TableName, TypeName};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Suffix of per-type version tables.
pub const VERSIONS_SUFFIX: &str = "_Versions";

/// Suffix of the base type's live table.
pub const LIVE_SUFFIX: &str = "_Live";

/// Name of the table that persists the registered hierarchy.
pub const TYPES_TABLE: &str = "keepset_types";

/// Maximum length of a type name.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Returns `true` if `name` is safe to use as an unquoted table stem.
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quotes a validated identifier for use in SQL.
#[must_use]
pub fn quote(table: &TableName) -> String {
    format!("\"{}\"", table.as_str())
}

/// A registered type hierarchy.
#[derive(Debug, Clone)]
pub struct TypeSchema {
    base: TypeName,
    parents: BTreeMap<TypeName, Option<TypeName>>,
}

impl TypeSchema {
    /// Creates a schema containing only the base type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the base name is not a valid identifier.
    pub fn new(base: TypeName) -> Result<Self> {
        validate(&base)?;
        let mut parents = BTreeMap::new();
        parents.insert(base.clone(), None);
        Ok(Self { base, parents })
    }

    /// Returns the base type of the hierarchy.
    #[must_use]
    pub const fn base(&self) -> &TypeName {
        &self.base
    }

    /// Returns `true` if the type is part of this hierarchy.
    #[must_use]
    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.parents.contains_key(type_name)
    }

    /// Registers a subtype under an existing parent.
    ///
    /// Re-registering a type under the same parent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the name is invalid, the parent is
    /// unknown, or the type is already registered under a different parent.
    pub fn register(&mut self, type_name: TypeName, parent: &TypeName) -> Result<bool> {
        validate(&type_name)?;
        if !self.contains(parent) {
            return Err(Error::InvalidInput(format!(
                "parent type '{parent}' is not registered under '{}'",
                self.base
            )));
        }
        match self.parents.get(&type_name) {
            Some(Some(existing)) if existing == parent => Ok(false),
            Some(_) => Err(Error::InvalidInput(format!(
                "type '{type_name}' is already registered with a different parent"
            ))),
            None => {
                self.parents.insert(type_name, Some(parent.clone()));
                Ok(true)
            },
        }
    }

    /// Returns the type followed by its ancestors, concrete type first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the type is not registered.
    pub fn ancestry(&self, type_name: &TypeName) -> Result<Vec<TypeName>> {
        let mut chain = Vec::new();
        let mut current = Some(type_name.clone());
        while let Some(name) = current {
            let parent = self.parents.get(&name).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "type '{name}' is not registered under '{}'",
                    self.base
                ))
            })?;
            current = parent.clone();
            chain.push(name);
        }
        Ok(chain)
    }

    /// Returns the type and every registered subtype of it.
    #[must_use]
    pub fn descendants_or_self(&self, type_name: &TypeName) -> BTreeSet<TypeName> {
        self.parents
            .keys()
            .filter(|candidate| {
                self.ancestry(candidate)
                    .is_ok_and(|chain| chain.contains(type_name))
            })
            .cloned()
            .collect()
    }

    /// Returns the version tables for a type, concrete type first and the
    /// base table last.
    ///
    /// The base table holds the rows `list_versions` reads, so deleting it
    /// last keeps a partially failed delete visible to a retry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the type is not registered.
    pub fn version_tables(&self, type_name: &TypeName) -> Result<Vec<TableName>> {
        Ok(self
            .ancestry(type_name)?
            .iter()
            .map(Self::version_table)
            .collect())
    }

    /// Returns the version table of a single type.
    #[must_use]
    pub fn version_table(type_name: &TypeName) -> TableName {
        TableName::new(format!("{type_name}{VERSIONS_SUFFIX}"))
    }

    /// Returns the base type's current-state table.
    #[must_use]
    pub fn records_table(&self) -> TableName {
        TableName::new(self.base.as_str())
    }

    /// Returns the base type's live table.
    #[must_use]
    pub fn live_table(&self) -> TableName {
        TableName::new(format!("{}{LIVE_SUFFIX}", self.base))
    }

    /// Returns the base type's version table.
    #[must_use]
    pub fn base_versions_table(&self) -> TableName {
        Self::version_table(&self.base)
    }

    /// Returns `true` if the table is one of this hierarchy's version tables.
    #[must_use]
    pub fn owns_version_table(&self, table: &TableName) -> bool {
        self.parents
            .keys()
            .any(|type_name| &Self::version_table(type_name) == table)
    }

    /// DDL for the base type's tables.
    #[must_use]
    pub fn base_ddl(&self) -> String {
        let records = quote(&self.records_table());
        let live = quote(&self.live_table());
        let versions = quote(&self.base_versions_table());
        format!(
            "CREATE TABLE IF NOT EXISTS {records} (
                id INTEGER PRIMARY KEY,
                type_name TEXT NOT NULL,
                version INTEGER NOT NULL,
                parent_id INTEGER,
                segment TEXT
            );
            CREATE TABLE IF NOT EXISTS {live} (
                id INTEGER PRIMARY KEY,
                type_name TEXT NOT NULL,
                version INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {versions} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id INTEGER NOT NULL,
                version INTEGER NOT NULL,
                last_edited INTEGER NOT NULL,
                was_published INTEGER NOT NULL,
                type_name TEXT NOT NULL,
                parent_id INTEGER,
                segment TEXT,
                UNIQUE (record_id, version)
            );
            CREATE INDEX IF NOT EXISTS \"idx_{base}_versions_recency\"
                ON {versions} (record_id, last_edited DESC, version DESC);",
            base = self.base,
        )
    }

    /// DDL for a subtype's version table.
    #[must_use]
    pub fn subtype_ddl(type_name: &TypeName) -> String {
        let versions = quote(&Self::version_table(type_name));
        format!(
            "CREATE TABLE IF NOT EXISTS {versions} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                record_id INTEGER NOT NULL,
                version INTEGER NOT NULL,
                payload TEXT,
                UNIQUE (record_id, version)
            );"
        )
    }
}

fn validate(type_name: &TypeName) -> Result<()> {
    if is_valid_identifier(type_name.as_str()) {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "type name '{type_name}' must match [A-Za-z_][A-Za-z0-9_]*"
        )))
    }
}

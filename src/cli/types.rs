//! `types` command.

use super::{OutputFormat, output_error, write_json};
use crate::Result;
use crate::models::TypeName;
use crate::storage::SqliteVersionStore;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct TypeRow {
    name: TypeName,
    parent: Option<TypeName>,
    tables: Vec<String>,
}

/// Lists the registered hierarchy with each type's version tables.
///
/// # Errors
///
/// Returns an error if output fails.
pub fn cmd_types_list<W: Write>(
    store: &SqliteVersionStore,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    let schema = store.schema();
    let mut rows = Vec::new();
    for name in schema.descendants_or_self(schema.base()) {
        let ancestry = schema.ancestry(&name)?;
        let tables = schema.version_tables(&name)?;
        rows.push(TypeRow {
            parent: ancestry.get(1).cloned(),
            tables: tables.iter().map(ToString::to_string).collect(),
            name,
        });
    }

    match format {
        OutputFormat::Json => write_json(writer, &rows),
        OutputFormat::Text => {
            writeln!(writer, "{:<24}{:<24}TABLES", "TYPE", "PARENT").map_err(output_error)?;
            for row in &rows {
                let parent = row.parent.as_ref().map_or("-", TypeName::as_str);
                writeln!(
                    writer,
                    "{:<24}{:<24}{}",
                    row.name.as_str(),
                    parent,
                    row.tables.join(", ")
                )
                .map_err(output_error)?;
            }
            Ok(())
        },
    }
}

/// Registers a subtype under an existing parent.
///
/// # Errors
///
/// Returns an error if the name is invalid, the parent is unknown, or
/// output fails.
pub fn cmd_types_add<W: Write>(
    store: &SqliteVersionStore,
    name: &TypeName,
    parent: &TypeName,
    writer: &mut W,
) -> Result<()> {
    store.register_type(name, parent)?;
    writeln!(writer, "Registered {name} under {parent}").map_err(output_error)
}

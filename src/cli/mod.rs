//! CLI command implementations.
//!
//! Each submodule implements one `keepset` command. Commands write to any
//! [`Write`] so the binary passes stdout and tests pass a buffer.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prune` | Prune every live record of the given types with configured policies |
//! | `reset` | Keep only the live version and draft head of every live record |
//! | `record` | Prune a single record |
//! | `orphans` | Delete version rows of hard-deleted records |
//! | `archived` | Purge archived records, newest first, up to a limit |
//! | `types` | List or register types of the hierarchy |
//! | `config` | Show the resolved configuration |
//! | `hook` | Lifecycle hook handlers reading JSON from stdin |
//!
//! # Example Usage
//!
//! ```bash
//! # See what a prune would remove
//! keepset prune --type Page --dry-run
//!
//! # Collapse history to the live version
//! keepset reset --type Page
//!
//! # Called by the CMS after each publish
//! echo '{"record_id": 42}' | keepset hook publish
//! ```

mod cleanup;
mod config;
mod hook;
mod prune;
mod types;

pub use cleanup::{cmd_archived, cmd_orphans};
pub use config::cmd_config;
pub use hook::{HookEvent, cmd_hook};
pub use prune::{cmd_prune, cmd_record, cmd_reset};
pub use types::{cmd_types_add, cmd_types_list};

use crate::prune::BatchResult;
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One summary line per type plus a total.
    #[default]
    Text,
    /// The full result as JSON.
    Json,
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Text,
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Maps an output failure into [`Error::OperationFailed`].
pub(crate) fn output_error(e: impl fmt::Display) -> Error {
    Error::OperationFailed {
        operation: "write_output".to_string(),
        cause: e.to_string(),
    }
}

/// Writes a value as pretty JSON.
pub(crate) fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(output_error)?;
    writeln!(writer, "{json}").map_err(output_error)
}

/// Writes a batch result in the requested format.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_batch<W: Write>(
    writer: &mut W,
    result: &BatchResult,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(writer, result),
        OutputFormat::Text => {
            for line in result.summary_lines() {
                writeln!(writer, "{line}").map_err(output_error)?;
            }
            Ok(())
        },
    }
}

//! `hook` command.

use super::output_error;
use crate::hooks::{HookHandler, PublishHook};
use crate::prune::RetentionPruner;
use crate::storage::VersionStore;
use crate::{Error, Result};
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

/// Hook events the CLI can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// A record was published.
    Publish,
}

impl FromStr for HookEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "publish" | "on-publish" | "after-publish" => Ok(Self::Publish),
            other => Err(Error::InvalidInput(format!("unknown hook event '{other}'"))),
        }
    }
}

/// Runs a hook handler on `input` and writes its JSON response.
///
/// # Errors
///
/// Returns an error if the handler fails or output fails.
pub fn cmd_hook<S: VersionStore, W: Write>(
    pruner: Arc<RetentionPruner<S>>,
    event: HookEvent,
    input: &str,
    writer: &mut W,
) -> Result<()> {
    let handler: Box<dyn HookHandler> = match event {
        HookEvent::Publish => Box::new(PublishHook::new(pruner)),
    };
    let response = handler.handle(input)?;
    writeln!(writer, "{response}").map_err(output_error)
}

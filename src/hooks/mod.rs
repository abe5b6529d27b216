//! Lifecycle hooks.
//!
//! The hosting application calls a hook after a lifecycle event. Hooks never
//! fail the event they observe: errors are logged and swallowed by
//! [`PublishHook::on_publish`], and only surface through [`HookHandler::handle`]
//! so the CLI can exit non-zero.
//!
//! # Hook Input JSON Format
//!
//! | Event | Input | Output |
//! |-------|-------|--------|
//! | `publish` | `{"record_id": 42}` | the [`PruneOutcome`](crate::PruneOutcome) as JSON |

mod publish;

pub use publish::{PublishEvent, PublishHook};

use crate::Result;

/// Trait for hook handlers.
pub trait HookHandler: Send + Sync {
    /// The hook event type this handler processes.
    fn event_type(&self) -> &'static str;

    /// Handles the hook event.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is malformed or handling fails.
    fn handle(&self, input: &str) -> Result<String>;
}

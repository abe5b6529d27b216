//! Publish hook handler.

use super::HookHandler;
use crate::models::RecordId;
use crate::prune::{PruneOutcome, RetentionPruner};
use crate::storage::VersionStore;
use crate::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Input of the `publish` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PublishEvent {
    /// The record that was just published.
    pub record_id: RecordId,
}

/// Prunes a record's history after each successful publish.
pub struct PublishHook<S: VersionStore> {
    pruner: Arc<RetentionPruner<S>>,
}

impl<S: VersionStore> PublishHook<S> {
    /// Creates a new hook around a shared pruner.
    #[must_use]
    pub const fn new(pruner: Arc<RetentionPruner<S>>) -> Self {
        Self { pruner }
    }

    /// Prunes the record with its configured policy.
    ///
    /// Fire-and-forget: a failure is logged and `None` is returned, so the
    /// publish that triggered the hook is never affected.
    #[instrument(name = "keepset.hook.publish", skip(self), fields(record_id = %record_id))]
    pub fn on_publish(&self, record_id: RecordId) -> Option<PruneOutcome> {
        match self.pruner.prune_record(record_id, false) {
            Ok(outcome) => {
                info!(
                    record_id = %record_id,
                    versions_deleted = outcome.versions_removed(),
                    rows_deleted = outcome.rows_deleted,
                    "Pruned history after publish"
                );
                Some(outcome)
            },
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Post-publish prune failed");
                metrics::counter!("hook_failures_total", "event" => "publish").increment(1);
                None
            },
        }
    }
}

impl<S: VersionStore> HookHandler for PublishHook<S> {
    fn event_type(&self) -> &'static str {
        "publish"
    }

    fn handle(&self, input: &str) -> Result<String> {
        let event: PublishEvent = serde_json::from_str(input)
            .map_err(|e| Error::InvalidInput(format!("publish event: {e}")))?;
        let outcome = self.pruner.prune_record(event.record_id, false)?;
        serde_json::to_string(&outcome)
            .map_err(|e| Error::InvalidInput(format!("serialize outcome: {e}")))
    }
}

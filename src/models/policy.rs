//! Retention policy values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of published versions to keep.
pub const DEFAULT_KEEP_VERSIONS: u32 = 10;

/// Default number of draft versions to keep.
pub const DEFAULT_KEEP_DRAFTS: u32 = 5;

/// A history length limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    /// Keep at most this many versions. `Keep(0)` keeps none beyond protected rows.
    Keep(u32),
    /// No limit: rows of this kind are never deleted by the count rule.
    Disabled,
}

impl Limit {
    /// Returns the limit as a count, or `None` when disabled.
    #[must_use]
    pub const fn count(self) -> Option<u32> {
        match self {
            Self::Keep(n) => Some(n),
            Self::Disabled => None,
        }
    }

    /// Returns `true` if this limit retains at least as much as `other`.
    #[must_use]
    pub const fn is_at_least(self, other: Self) -> bool {
        match (self, other) {
            (Self::Disabled, _) => true,
            (Self::Keep(_), Self::Disabled) => false,
            (Self::Keep(a), Self::Keep(b)) => a >= b,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keep(n) => write!(f, "{n}"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Retention policy for one concrete record type.
///
/// Read-only for the duration of a prune.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Published history length.
    pub keep_versions: Limit,
    /// Draft history length.
    pub keep_drafts: Limit,
    /// Keep the newest version at every former location.
    pub keep_redirects: bool,
    /// Keep versions written under a different record type.
    pub keep_old_types: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_versions: Limit::Keep(DEFAULT_KEEP_VERSIONS),
            keep_drafts: Limit::Keep(DEFAULT_KEEP_DRAFTS),
            keep_redirects: true,
            keep_old_types: false,
        }
    }
}

impl RetentionPolicy {
    /// The policy used by reset runs: the live version and draft head only.
    #[must_use]
    pub const fn live_only() -> Self {
        Self {
            keep_versions: Limit::Keep(1),
            keep_drafts: Limit::Keep(0),
            keep_redirects: false,
            keep_old_types: false,
        }
    }

    /// Sets the published history length.
    #[must_use]
    pub const fn with_keep_versions(mut self, limit: Limit) -> Self {
        self.keep_versions = limit;
        self
    }

    /// Sets the draft history length.
    #[must_use]
    pub const fn with_keep_drafts(mut self, limit: Limit) -> Self {
        self.keep_drafts = limit;
        self
    }

    /// Enables or disables redirect preservation.
    #[must_use]
    pub const fn with_keep_redirects(mut self, keep: bool) -> Self {
        self.keep_redirects = keep;
        self
    }

    /// Enables or disables keeping versions of previous types.
    #[must_use]
    pub const fn with_keep_old_types(mut self, keep: bool) -> Self {
        self.keep_old_types = keep;
        self
    }

    /// Returns `true` if `self` is no stricter than `other` in every dimension.
    #[must_use]
    pub const fn is_at_least_as_lenient_as(&self, other: &Self) -> bool {
        self.keep_versions.is_at_least(other.keep_versions)
            && self.keep_drafts.is_at_least(other.keep_drafts)
            && (self.keep_redirects || !other.keep_redirects)
            && (self.keep_old_types || !other.keep_old_types)
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "keep_versions={} keep_drafts={} keep_redirects={} keep_old_types={}",
            self.keep_versions, self.keep_drafts, self.keep_redirects, self.keep_old_types
        )
    }
}

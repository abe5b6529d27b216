//! Configuration management.
//!
//! Configuration is read from a TOML file and then adjusted by environment
//! variables:
//!
//! ```toml
//! database = "site.db"
//! base_type = "Page"
//! vacuum_tables = false
//!
//! [retention]
//! keep_versions = 10
//! keep_drafts = 5
//! keep_redirects = true
//! keep_old_types = false
//!
//! [retention.types.BlogPost]
//! keep_versions = 20
//!
//! [observability.logging]
//! format = "json"
//! ```
//!
//! Retention values are kept as written and only validated when a policy is
//! resolved for a type, so one malformed override fails that type alone.

use crate::models::{Limit, RetentionPolicy, TypeName};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "KEEPSET_CONFIG_PATH";

/// Environment variable overriding the database path.
pub const DATABASE_ENV: &str = "KEEPSET_DATABASE";

/// Environment variables overriding the default retention values.
pub const KEEP_VERSIONS_ENV: &str = "KEEPSET_KEEP_VERSIONS";
/// See [`KEEP_VERSIONS_ENV`].
pub const KEEP_DRAFTS_ENV: &str = "KEEPSET_KEEP_DRAFTS";
/// See [`KEEP_VERSIONS_ENV`].
pub const KEEP_REDIRECTS_ENV: &str = "KEEPSET_KEEP_REDIRECTS";
/// See [`KEEP_VERSIONS_ENV`].
pub const KEEP_OLD_TYPES_ENV: &str = "KEEPSET_KEEP_OLD_TYPES";

/// Default base type of the versioned hierarchy.
pub const DEFAULT_BASE_TYPE: &str = "Page";

/// A retention value as written in config, before validation.
///
/// Accepts integers, booleans and strings so that `keep_drafts = false` and
/// `KEEPSET_KEEP_DRAFTS=disabled` both work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// An integer.
    Int(i64),
    /// A boolean.
    Bool(bool),
    /// Free text.
    Text(String),
}

impl SettingValue {
    /// Parses an environment variable value.
    #[must_use]
    pub fn from_env_str(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<i64>().map_or_else(|_| Self::Text(raw.to_string()), Self::Int)
    }

    /// Interprets the value as a history limit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for negative numbers, `true`, or text other
    /// than `disabled`, `off` or `false`.
    pub fn as_limit(&self, key: &str) -> Result<Limit> {
        match self {
            Self::Int(n) => u32::try_from(*n).map(Limit::Keep).map_err(|_| {
                Error::Config(format!("{key} must be a non-negative integer, got {n}"))
            }),
            Self::Bool(false) => Ok(Limit::Disabled),
            Self::Bool(true) => Err(Error::Config(format!(
                "{key} must be a number or false, got true"
            ))),
            Self::Text(text) => match text.to_lowercase().as_str() {
                "disabled" | "off" | "false" => Ok(Limit::Disabled),
                _ => Err(Error::Config(format!(
                    "{key} must be a number or \"disabled\", got \"{text}\""
                ))),
            },
        }
    }

    /// Interprets the value as a flag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for anything that is not recognisably on or off.
    pub fn as_flag(&self, key: &str) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            Self::Int(0) => Ok(false),
            Self::Int(1) => Ok(true),
            Self::Int(n) => Err(Error::Config(format!("{key} must be a boolean, got {n}"))),
            Self::Text(text) => match text.to_lowercase().as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => Err(Error::Config(format!(
                    "{key} must be a boolean, got \"{text}\""
                ))),
            },
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(t) => write!(f, "\"{t}\""),
        }
    }
}

/// Partial retention settings, applied on top of an inherited policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOverride {
    /// Published history length.
    pub keep_versions: Option<SettingValue>,
    /// Draft history length.
    pub keep_drafts: Option<SettingValue>,
    /// Keep the newest version at every former location.
    pub keep_redirects: Option<SettingValue>,
    /// Keep versions written under a previous type.
    pub keep_old_types: Option<SettingValue>,
}

impl PolicyOverride {
    /// Returns `true` if no value is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keep_versions.is_none()
            && self.keep_drafts.is_none()
            && self.keep_redirects.is_none()
            && self.keep_old_types.is_none()
    }

    /// Applies the set values to `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any set value is malformed.
    pub fn apply(&self, policy: RetentionPolicy) -> Result<RetentionPolicy> {
        let mut policy = policy;
        if let Some(value) = &self.keep_versions {
            policy.keep_versions = value.as_limit("keep_versions")?;
        }
        if let Some(value) = &self.keep_drafts {
            policy.keep_drafts = value.as_limit("keep_drafts")?;
        }
        if let Some(value) = &self.keep_redirects {
            policy.keep_redirects = value.as_flag("keep_redirects")?;
        }
        if let Some(value) = &self.keep_old_types {
            policy.keep_old_types = value.as_flag("keep_old_types")?;
        }
        Ok(policy)
    }
}

/// Retention defaults plus per-type overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Overrides applied to every type.
    pub defaults: PolicyOverride,
    /// Overrides for individual types, inherited by their subtypes.
    pub types: BTreeMap<TypeName, PolicyOverride>,
}

impl RetentionSettings {
    /// Sets an override for one type.
    #[must_use]
    pub fn with_type(mut self, type_name: TypeName, policy: PolicyOverride) -> Self {
        self.types.insert(type_name, policy);
        self
    }

    /// Resolves the policy for a type given its ancestry (concrete type first).
    ///
    /// Built-in defaults are applied first, then the configured defaults,
    /// then each ancestor's override from the root down to the type itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the type whose override is malformed.
    pub fn resolve(&self, ancestry: &[TypeName]) -> Result<RetentionPolicy> {
        let mut policy = self
            .defaults
            .apply(RetentionPolicy::default())
            .map_err(|e| Error::Config(format!("[retention]: {}", strip_prefix(&e))))?;

        for type_name in ancestry.iter().rev() {
            if let Some(layer) = self.types.get(type_name) {
                policy = layer.apply(policy).map_err(|e| {
                    Error::Config(format!("[retention.types.{type_name}]: {}", strip_prefix(&e)))
                })?;
            }
        }

        Ok(policy)
    }

    /// Applies environment overrides to the defaults using `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).map(|v| SettingValue::from_env_str(&v));
        if let Some(value) = read(KEEP_VERSIONS_ENV) {
            self.defaults.keep_versions = Some(value);
        }
        if let Some(value) = read(KEEP_DRAFTS_ENV) {
            self.defaults.keep_drafts = Some(value);
        }
        if let Some(value) = read(KEEP_REDIRECTS_ENV) {
            self.defaults.keep_redirects = Some(value);
        }
        if let Some(value) = read(KEEP_OLD_TYPES_ENV) {
            self.defaults.keep_old_types = Some(value);
        }
    }
}

fn strip_prefix(err: &Error) -> String {
    match err {
        Error::Config(msg) => msg.clone(),
        other => other.to_string(),
    }
}

/// Logging section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    pub format: Option<String>,
    /// Default level filter (e.g. `info`, `keepset=debug`).
    pub level: Option<String>,
    /// Append log output to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Metrics section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether a Prometheus recorder is installed.
    pub enabled: Option<bool>,
}

/// Observability section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: Option<LoggingSettings>,
    /// Metrics settings.
    pub metrics: Option<MetricsSettings>,
}

/// Main configuration for keepset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeepsetConfig {
    /// Path to the `SQLite` database holding the version tables.
    pub database: PathBuf,
    /// Base type of the versioned hierarchy.
    pub base_type: TypeName,
    /// Reclaim storage after batch runs that deleted rows.
    pub vacuum_tables: bool,
    /// Retention defaults and per-type overrides.
    pub retention: RetentionSettings,
    /// Logging and metrics settings.
    pub observability: ObservabilitySettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Database path.
    pub database: Option<String>,
    /// Base type.
    pub base_type: Option<String>,
    /// Vacuum after batch runs.
    pub vacuum_tables: Option<bool>,
    /// Retention section.
    pub retention: Option<ConfigFileRetention>,
    /// Observability section.
    pub observability: Option<ObservabilitySettings>,
}

/// Retention section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileRetention {
    /// Default published history length.
    pub keep_versions: Option<SettingValue>,
    /// Default draft history length.
    pub keep_drafts: Option<SettingValue>,
    /// Default redirect preservation.
    pub keep_redirects: Option<SettingValue>,
    /// Default old type retention.
    pub keep_old_types: Option<SettingValue>,
    /// Per-type overrides.
    pub types: Option<BTreeMap<String, PolicyOverride>>,
}

impl Default for KeepsetConfig {
    fn default() -> Self {
        Self {
            database: crate::storage::default_database_path(),
            base_type: TypeName::from(DEFAULT_BASE_TYPE),
            vacuum_tables: false,
            retention: RetentionSettings::default(),
            observability: ObservabilitySettings::default(),
        }
    }
}

impl KeepsetConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. `KEEPSET_CONFIG_PATH`
    /// 2. Platform-specific config dir (`~/.config/keepset/config.toml` on Linux)
    ///
    /// Returns default configuration if no config file is found.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a config file exists but is invalid.
    pub fn load_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load_from_file(Path::new(&path));
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let platform_config = base_dirs.config_dir().join("keepset").join("config.toml");
        if platform_config.exists() {
            return Self::load_from_file(&platform_config);
        }

        Ok(Self::default())
    }

    /// Converts a `ConfigFile` to `KeepsetConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(database) = file.database {
            config.database = PathBuf::from(database);
        }
        if let Some(base_type) = file.base_type {
            config.base_type = TypeName::from(base_type);
        }
        if let Some(vacuum) = file.vacuum_tables {
            config.vacuum_tables = vacuum;
        }
        if let Some(retention) = file.retention {
            config.retention.defaults = PolicyOverride {
                keep_versions: retention.keep_versions,
                keep_drafts: retention.keep_drafts,
                keep_redirects: retention.keep_redirects,
                keep_old_types: retention.keep_old_types,
            };
            config.retention.types = retention
                .types
                .unwrap_or_default()
                .into_iter()
                .map(|(name, policy)| (TypeName::from(name), policy))
                .collect();
        }
        if let Some(observability) = file.observability {
            config.observability = observability;
        }

        config
    }

    /// Applies `KEEPSET_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup` instead of the process environment.
    #[must_use]
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(database) = lookup(DATABASE_ENV) {
            self.database = PathBuf::from(database);
        }
        self.retention.apply_env(&lookup);
        self
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<PathBuf>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the retention settings.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionSettings) -> Self {
        self.retention = retention;
        self
    }

    /// Enables or disables vacuuming after batch runs.
    #[must_use]
    pub const fn with_vacuum_tables(mut self, vacuum: bool) -> Self {
        self.vacuum_tables = vacuum;
        self
    }

    /// Resolves the retention policy for a type given its ancestry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a value along the ancestry is malformed.
    pub fn resolve_policy(&self, ancestry: &[TypeName]) -> Result<RetentionPolicy> {
        self.retention.resolve(ancestry)
    }
}

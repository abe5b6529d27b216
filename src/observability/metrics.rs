//! Prometheus metrics.

use crate::config::MetricsSettings;
use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Environment variable enabling metrics.
pub const METRICS_ENABLED_ENV: &str = "KEEPSET_METRICS_ENABLED";

/// Metrics configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsConfig {
    /// Whether a Prometheus recorder is installed.
    pub enabled: bool,
}

impl MetricsConfig {
    /// Builds metrics configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: Option<&MetricsSettings>) -> Self {
        let mut config = Self {
            enabled: settings.and_then(|s| s.enabled).unwrap_or(false),
        };
        if let Some(enabled) = parse_bool_env(METRICS_ENABLED_ENV) {
            config.enabled = enabled;
        }
        config
    }
}

fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        let value = value.to_lowercase();
        value == "true" || value == "1" || value == "yes"
    })
}

/// Installs the Prometheus recorder when metrics are enabled.
///
/// There is no HTTP listener: the process is short-lived, so the snapshot is
/// rendered on demand through the returned handle.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_prometheus(config: MetricsConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    PrometheusBuilder::new()
        .install_recorder()
        .map(Some)
        .map_err(|e| Error::OperationFailed {
            operation: "metrics_recorder_install".to_string(),
            cause: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_metrics_install_nothing() {
        let handle = install_prometheus(MetricsConfig::default()).unwrap();
        assert!(handle.is_none());
    }

    #[test]
    fn test_from_settings() {
        let settings = MetricsSettings {
            enabled: Some(true),
        };
        // env override is only applied when the variable is set
        if std::env::var(METRICS_ENABLED_ENV).is_err() {
            assert!(MetricsConfig::from_settings(Some(&settings)).enabled);
            assert!(!MetricsConfig::from_settings(None).enabled);
        }
    }
}

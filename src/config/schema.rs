//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Keys are
//! kebab-case, e.g. `correlate-trace-to-diagnostic-context`.

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct HarnessConfig {
    /// Trace propagation settings.
    pub tracing: TracingConfig,

    /// Test execution settings.
    pub runner: RunnerConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

impl HarnessConfig {
    /// Build a configuration from flat `key = value` properties applied over defaults.
    pub fn from_properties<I, K, V>(properties: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in properties {
            config.apply_property(key.as_ref(), value.as_ref())?;
        }
        Ok(config)
    }

    /// Apply a single flat property.
    pub fn apply_property(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        match key.trim() {
            CORRELATE_TRACE_KEY => {
                self.tracing.correlate_trace_to_diagnostic_context = parse_bool(key, value)?;
            }
            "parallelism" => {
                self.runner.parallelism = value.parse().map_err(|_| ConfigError::InvalidProperty {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            }
            "log-level" => self.observability.log_level = value.to_string(),
            "log-diagnostic-context" => {
                self.observability.log_diagnostic_context = parse_bool(key, value)?;
            }
            "metrics-enabled" => self.observability.metrics_enabled = parse_bool(key, value)?,
            other => return Err(ConfigError::UnknownProperty(other.to_string())),
        }
        Ok(())
    }
}

/// Flat property key toggling diagnostic-context correlation.
pub const CORRELATE_TRACE_KEY: &str = "correlate-trace-to-diagnostic-context";

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidProperty {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Trace propagation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct TracingConfig {
    /// Mirror `traceId`/`spanId` into the thread's diagnostic map while a test runs.
    pub correlate_trace_to_diagnostic_context: bool,
}

/// Test execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Number of worker threads executing test cases.
    pub parallelism: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prefix log lines with the thread's diagnostic entries.
    pub log_diagnostic_context: bool,

    /// Record harness counters through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_diagnostic_context: true,
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert!(!config.tracing.correlate_trace_to_diagnostic_context);
        assert!(config.runner.parallelism >= 1);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_flat_properties() {
        let config = HarnessConfig::from_properties([
            ("correlate-trace-to-diagnostic-context", "true"),
            ("parallelism", "4"),
        ])
        .unwrap();
        assert!(config.tracing.correlate_trace_to_diagnostic_context);
        assert_eq!(config.runner.parallelism, 4);
    }

    #[test]
    fn test_bad_properties() {
        let err = HarnessConfig::from_properties([("correlate-trace-to-diagnostic-context", "yes")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { .. }));

        let err = HarnessConfig::from_properties([("utilitest.tracing.add-to-mdc", "true")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProperty(_)));
    }
}

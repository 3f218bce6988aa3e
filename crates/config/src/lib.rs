#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Operator-tunable defaults for a running kernel, loaded from TOML.
//!
//! [`kestrel_core::constants`] hard-codes the handful of limits treated
//! as non-negotiable (`SYSTEM_MAX_LOOPS`, the retry backoff curve);
//! [`KernelConfig`] covers everything above that line which a deployment
//! reasonably wants to tune without a rebuild — the fallback per-node
//! timeout and retry count a workflow's own settings can still override,
//! the event bus's backlog capacity, and how long an `ask_human` call
//! waits before timing out when a caller doesn't specify one. Building a
//! `KernelConfig` never changes `SYSTEM_MAX_LOOPS` itself; the Graph
//! Runner enforces that ceiling independently of anything loaded here.

use std::time::Duration;

use kestrel_core::constants::{RETRY_BACKOFF_BASE, RETRY_BACKOFF_CAP, SYSTEM_DEFAULT_TIMEOUT};
use serde::{Deserialize, Serialize};

/// Process-wide defaults read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Per-node timeout used when neither the node nor its workflow sets one.
    pub default_timeout_ms: u64,
    /// Per-node retry count used when neither the node nor its workflow sets one.
    pub default_max_retries: u32,
    /// Base delay, in milliseconds, for exponential retry backoff.
    pub retry_backoff_base_ms: u64,
    /// Cap, in milliseconds, on retry backoff delay.
    pub retry_backoff_cap_ms: u64,
    /// Ring buffer capacity for [`kestrel_telemetry::EventBus`].
    pub event_bus_capacity: usize,
    /// Default `ask_human` timeout, in seconds, when a caller omits one.
    pub default_hitl_timeout_seconds: u64,
}

impl KernelConfig {
    /// Parse a `KernelConfig` from a TOML document, filling any field the
    /// document omits from [`KernelConfig::default`].
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] if `toml` is not valid TOML or does
    /// not match this struct's shape.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|source| ConfigError::Parse { source })
    }

    /// This config's default timeout as a [`Duration`].
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// This config's retry backoff base as a [`Duration`].
    #[must_use]
    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    /// This config's retry backoff cap as a [`Duration`].
    #[must_use]
    pub fn retry_backoff_cap(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_cap_ms)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: SYSTEM_DEFAULT_TIMEOUT.as_millis() as u64,
            default_max_retries: 0,
            retry_backoff_base_ms: RETRY_BACKOFF_BASE.as_millis() as u64,
            retry_backoff_cap_ms: RETRY_BACKOFF_CAP.as_millis() as u64,
            event_bus_capacity: 1024,
            default_hitl_timeout_seconds: 3600,
        }
    }
}

/// Failure loading a [`KernelConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed into a [`KernelConfig`].
    #[error("invalid kernel config: {source}")]
    Parse {
        /// The underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_matches_system_constants() {
        let config = KernelConfig::default();
        assert_eq!(config.default_timeout_ms, 60_000);
        assert_eq!(config.retry_backoff_base_ms, 5_000);
        assert_eq!(config.retry_backoff_cap_ms, 30_000);
    }

    #[test]
    fn from_toml_str_overrides_selected_fields() {
        let config = KernelConfig::from_toml_str(
            r#"
            default_timeout_ms = 15000
            event_bus_capacity = 256
            "#,
        )
        .unwrap();

        assert_eq!(config.default_timeout_ms, 15_000);
        assert_eq!(config.event_bus_capacity, 256);
        // Untouched fields keep their defaults.
        assert_eq!(config.default_max_retries, 0);
        assert_eq!(config.retry_backoff_base_ms, 5_000);
    }

    #[test]
    fn from_toml_str_empty_document_is_all_defaults() {
        let config = KernelConfig::from_toml_str("").unwrap();
        assert_eq!(config, KernelConfig::default());
    }

    #[test]
    fn from_toml_str_rejects_malformed_toml() {
        let err = KernelConfig::from_toml_str("default_timeout_ms = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn duration_accessors_convert_from_millis() {
        let config = KernelConfig::default();
        assert_eq!(config.default_timeout(), Duration::from_millis(60_000));
        assert_eq!(config.retry_backoff_base(), Duration::from_secs(5));
        assert_eq!(config.retry_backoff_cap(), Duration::from_secs(30));
    }
}

//! The retryable/fatal error taxonomy node handlers report through.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Error type for all node handler invocations.
///
/// Distinguishes retryable from fatal errors so the Graph Runner can decide
/// retry policy (backoff, attempt budget) without the handler needing to
/// know about resilience patterns itself.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum HandlerError {
    /// Transient failure; the runner may retry according to its policy.
    #[error("retryable: {message}")]
    Retryable {
        /// Human-readable error message.
        message: String,
        /// Suggested delay before retry (the runner's own backoff may
        /// override this).
        backoff_hint: Option<Duration>,
        /// Partial result produced before the failure, if any.
        partial_output: Option<Value>,
    },

    /// Permanent failure; the runner must never retry.
    #[error("fatal: {message}")]
    Fatal {
        /// Human-readable error message.
        message: String,
        /// Optional structured details about the failure.
        details: Option<Value>,
    },

    /// The node's `config` failed validation before execution began.
    #[error("validation: {0}")]
    Validation(String),

    /// Execution was cancelled via the execution's cancellation token.
    #[error("cancelled")]
    Cancelled,
}

impl HandlerError {
    /// Construct a retryable error with no backoff hint.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
            backoff_hint: None,
            partial_output: None,
        }
    }

    /// Construct a retryable error carrying a suggested backoff.
    #[must_use]
    pub fn retryable_with_backoff(message: impl Into<String>, backoff: Duration) -> Self {
        Self::Retryable {
            message: message.into(),
            backoff_hint: Some(backoff),
            partial_output: None,
        }
    }

    /// Construct a fatal (non-retryable) error.
    #[must_use]
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            details: None,
        }
    }

    /// Construct a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// `true` if the Graph Runner should consider retrying this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// `true` if this error is permanent and must never be retried.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Validation(_))
    }

    /// The suggested backoff, if this is a retryable error that set one.
    #[must_use]
    pub fn backoff_hint(&self) -> Option<Duration> {
        match self {
            Self::Retryable { backoff_hint, .. } => *backoff_hint,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_is_retryable_not_fatal() {
        let err = HandlerError::retryable("connection reset");
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
        assert!(err.backoff_hint().is_none());
    }

    #[test]
    fn retryable_with_backoff_carries_hint() {
        let err = HandlerError::retryable_with_backoff("rate limited", Duration::from_secs(5));
        assert_eq!(err.backoff_hint(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn fatal_is_not_retryable() {
        let err = HandlerError::fatal("invalid config");
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn validation_is_fatal() {
        let err = HandlerError::validation("url is required");
        assert!(err.is_fatal());
    }

    #[test]
    fn cancelled_is_neither() {
        let err = HandlerError::Cancelled;
        assert!(!err.is_retryable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn display_formatting() {
        assert_eq!(HandlerError::retryable("timeout").to_string(), "retryable: timeout");
        assert_eq!(HandlerError::fatal("bad schema").to_string(), "fatal: bad schema");
        assert_eq!(
            HandlerError::validation("missing field").to_string(),
            "validation: missing field"
        );
        assert_eq!(HandlerError::Cancelled.to_string(), "cancelled");
    }
}

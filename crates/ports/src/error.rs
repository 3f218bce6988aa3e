//! Error type shared by every port operation.

use std::time::Duration;

use thiserror::Error;

/// Error type for all port operations.
///
/// Distinguishes retryable failures (connection, timeout) from permanent
/// ones (not found, conflict, serialization) so callers can apply retry
/// policy without inspecting error messages.
#[derive(Debug, Error)]
pub enum PortsError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g. `"Workflow"`, `"Execution"`).
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Optimistic concurrency conflict.
    #[error("{entity} {id}: expected version {expected_version}, got {actual_version}")]
    Conflict {
        /// Kind of entity.
        entity: String,
        /// Identifier of the conflicting entity.
        id: String,
        /// Version the caller expected.
        expected_version: u64,
        /// Version currently stored.
        actual_version: u64,
    },

    /// Backend connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its timeout.
    #[error("timeout: {operation} after {duration:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// How long was waited before giving up.
        duration: Duration,
    },

    /// No credential is bound for the requested type.
    #[error("credential not bound: {credential_type}")]
    CredentialNotBound {
        /// The credential-type tag that was requested.
        credential_type: String,
    },

    /// Catch-all internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortsError {
    /// Convenience constructor for [`PortsError::NotFound`].
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`PortsError::Conflict`].
    #[must_use]
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
            expected_version: expected,
            actual_version: actual,
        }
    }

    /// Convenience constructor for [`PortsError::Timeout`].
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// `true` for transient errors a caller may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for PortsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_convenience() {
        let err = PortsError::not_found("Workflow", "abc-123");
        match &err {
            PortsError::NotFound { entity, id } => {
                assert_eq!(entity, "Workflow");
                assert_eq!(id, "abc-123");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn conflict_convenience() {
        let err = PortsError::conflict("Execution", "e-1", 3, 5);
        assert_eq!(err.to_string(), "Execution e-1: expected version 3, got 5");
    }

    #[test]
    fn connection_is_retryable() {
        assert!(PortsError::Connection("refused".into()).is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        assert!(PortsError::timeout("op", Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        assert!(!PortsError::not_found("X", "1").is_retryable());
    }

    #[test]
    fn credential_not_bound_is_not_retryable() {
        assert!(!PortsError::CredentialNotBound {
            credential_type: "smtp".into()
        }
        .is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let bad_json = serde_json::from_str::<serde_json::Value>("not json");
        let ports_err: PortsError = bad_json.unwrap_err().into();
        assert!(matches!(ports_err, PortsError::Serialization(_)));
    }
}

//! Runtime context handed to a node handler on each invocation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use kestrel_core::{ExecutionId, NodeId, WorkflowId};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

/// A string that redacts its contents in `Debug` and `Display`, used for
/// resolved credential values so they never land in a log line by accident.
#[derive(Clone)]
pub struct SecretString {
    inner: String,
}

impl SecretString {
    /// Wrap a resolved secret value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Access the underlying value. Callers must not log or persist it.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.inner
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Context passed to [`crate::NodeHandler::execute`] for a single node
/// invocation.
///
/// Constructed by the Graph Runner from the owning execution's
/// `ExecutionContext` before each call; credentials are resolved ahead of
/// time so this crate never needs to know how credential storage works.
#[non_exhaustive]
pub struct NodeContext {
    /// The execution this invocation belongs to.
    pub execution_id: ExecutionId,
    /// The node being invoked.
    pub node_id: NodeId,
    /// The workflow this execution belongs to.
    pub workflow_id: WorkflowId,
    /// Cancellation signal; handlers should check this cooperatively in
    /// loops or before expensive operations.
    pub cancellation: CancellationToken,
    /// Resolved credential values, keyed by credential-type tag (one of
    /// the handler's `declared_credentials`).
    credentials: HashMap<String, SecretString>,
    /// Shared workflow-scoped variables.
    variables: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
}

impl NodeContext {
    /// Construct a context with no credentials or variables bound yet.
    #[must_use]
    pub fn new(execution_id: ExecutionId, node_id: NodeId, workflow_id: WorkflowId) -> Self {
        Self {
            execution_id,
            node_id,
            workflow_id,
            cancellation: CancellationToken::new(),
            credentials: HashMap::new(),
            variables: Arc::new(RwLock::new(serde_json::Map::new())),
        }
    }

    /// Attach a cancellation token shared with the owning execution.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Attach the resolved credential values this node is authorized to use.
    #[must_use]
    pub fn with_credentials(mut self, credentials: HashMap<String, SecretString>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Attach the shared workflow-scoped variable map.
    #[must_use]
    pub fn with_variables(
        mut self,
        variables: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
    ) -> Self {
        self.variables = variables;
        self
    }

    /// Retrieve a resolved credential by its declared credential-type tag.
    ///
    /// # Errors
    /// Returns [`HandlerError::fatal`] if no credential was resolved for
    /// `credential_type` — the Compiler should have rejected this workflow
    /// before execution, so this indicates a kernel bug if it happens.
    pub fn credential(&self, credential_type: &str) -> Result<&SecretString, HandlerError> {
        self.credentials
            .get(credential_type)
            .ok_or_else(|| HandlerError::fatal(format!("no credential bound for `{credential_type}`")))
    }

    /// Read a workflow-scoped variable.
    #[must_use]
    pub fn get_variable(&self, key: &str) -> Option<serde_json::Value> {
        self.variables.read().get(key).cloned()
    }

    /// Write a workflow-scoped variable, visible to subsequent nodes.
    pub fn set_variable(&self, key: &str, value: serde_json::Value) {
        self.variables.write().insert(key.to_owned(), value);
    }

    /// Check whether the owning execution has been cancelled.
    ///
    /// Handlers should call this in long-running loops to support
    /// cooperative cancellation.
    ///
    /// # Errors
    /// Returns [`HandlerError::Cancelled`] if the token has fired.
    pub fn check_cancelled(&self) -> Result<(), HandlerError> {
        if self.cancellation.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeContext")
            .field("execution_id", &self.execution_id)
            .field("node_id", &self.node_id)
            .field("workflow_id", &self.workflow_id)
            .field("cancelled", &self.cancellation.is_cancelled())
            .field("credential_types", &self.credentials.keys().collect::<Vec<_>>())
            .finish()
    }
}

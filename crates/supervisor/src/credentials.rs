//! Resolves a workflow's credential references through a
//! [`kestrel_ports::CredentialRepo`] once at start time, and hands the
//! Graph Runner a pre-resolved lookup for the lifetime of the execution.
//!
//! The Compiler already verified every `credential_ref` is owned by the
//! invoking user and matches a declared type; this module's only job is
//! turning those references into decrypted values, scoped to one
//! execution, and zeroed when it drops.

use std::collections::HashMap;
use std::sync::Arc;

use kestrel_core::{NodeId, UserId};
use kestrel_engine::CredentialProvider;
use kestrel_node::SecretString;
use kestrel_ports::{CredentialRepo, PortsError};
use kestrel_workflow::Workflow;

/// Per-node credentials resolved once at execution start.
pub struct ResolvedCredentials {
    by_node: HashMap<NodeId, HashMap<String, SecretString>>,
}

impl ResolvedCredentials {
    /// Resolve every `credential_ref` in `workflow`'s nodes through `repo`,
    /// scoped to `owner`.
    ///
    /// # Errors
    /// Returns the first [`PortsError`] encountered resolving a reference.
    pub async fn resolve(
        workflow: &Workflow,
        owner: UserId,
        repo: &Arc<dyn CredentialRepo>,
    ) -> Result<Self, PortsError> {
        let mut by_node = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            let mut creds = HashMap::with_capacity(node.credential_refs.len());
            for credential_id in &node.credential_refs {
                let resolved = repo.resolve(*credential_id, owner).await?;
                creds.insert(resolved.credential_type, SecretString::new(resolved.value));
            }
            if !creds.is_empty() {
                by_node.insert(node.node_id, creds);
            }
        }
        Ok(Self { by_node })
    }

    /// An instance with nothing resolved, for workflows with no
    /// credential-consuming nodes.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_node: HashMap::new(),
        }
    }
}

impl CredentialProvider for ResolvedCredentials {
    fn credentials_for(&self, node_id: NodeId) -> HashMap<String, SecretString> {
        self.by_node.get(&node_id).cloned().unwrap_or_default()
    }
}

//! Per-node credential resolution.
//!
//! The runner never touches how credentials are stored or decrypted — the
//! Compiler already verified ownership at compile time, so by the time a
//! workflow reaches the runner, resolving a node's bound credentials is a
//! pure lookup the Supervisor layer owns. This crate only defines the seam.

use std::collections::HashMap;

use kestrel_core::NodeId;
use kestrel_node::SecretString;

/// Resolves the decrypted credential values a node is authorized to use,
/// keyed by credential-type tag.
pub trait CredentialProvider: Send + Sync {
    /// Return the resolved credentials for `node_id`, keyed by the
    /// credential-type tag the handler declared in its metadata.
    fn credentials_for(&self, node_id: NodeId) -> HashMap<String, SecretString>;
}

/// A provider with no bound credentials, for workflows with no
/// credential-consuming nodes and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn credentials_for(&self, _node_id: NodeId) -> HashMap<String, SecretString> {
        HashMap::new()
    }
}

//! Credential resolution port.
//!
//! The kernel never stores or transmits secret material itself — it holds
//! only a [`kestrel_core::CredentialId`] reference per node and resolves it
//! through this port immediately before invoking a handler. Resolved values
//! live only in the owning execution's in-memory context and are zeroed on
//! terminal transition.

use async_trait::async_trait;
use kestrel_core::{CredentialId, UserId};

use crate::error::PortsError;

/// A resolved credential: its declared type tag plus the decrypted value.
#[derive(Clone)]
pub struct ResolvedCredential {
    /// The credential-type tag (matched against a handler's `declared_credentials`).
    pub credential_type: String,
    /// The decrypted secret value.
    pub value: String,
}

impl std::fmt::Debug for ResolvedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedCredential")
            .field("credential_type", &self.credential_type)
            .field("value", &"***")
            .finish()
    }
}

/// Resolves credential references to decrypted values, scoped to the
/// requesting user.
#[async_trait]
pub trait CredentialRepo: Send + Sync {
    /// Resolve a credential, verifying it is owned by `owner`.
    ///
    /// # Errors
    /// Returns [`PortsError::NotFound`] if the credential doesn't exist or
    /// isn't owned by `owner` — the two cases are deliberately
    /// indistinguishable to callers, to avoid leaking existence of another
    /// user's credentials.
    async fn resolve(
        &self,
        id: CredentialId,
        owner: UserId,
    ) -> Result<ResolvedCredential, PortsError>;
}

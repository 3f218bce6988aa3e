//! Credentials available to the invoking user at compile time.
//!
//! The Compiler never sees secret material — only which credential ids the
//! user owns and what type each one is, so it can check a node's
//! `credential_refs` against a handler's `declared_credentials`.

use kestrel_core::CredentialId;

/// One credential the invoking user owns, as seen by the Compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailableCredential {
    /// The credential's identifier.
    pub id: CredentialId,
    /// The credential-type tag handlers declare against (e.g. `"http_bearer"`).
    pub credential_type: String,
}

impl AvailableCredential {
    /// Construct an available credential.
    #[must_use]
    pub fn new(id: CredentialId, credential_type: impl Into<String>) -> Self {
        Self {
            id,
            credential_type: credential_type.into(),
        }
    }
}

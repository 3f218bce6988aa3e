//! Strongly-typed identifiers for kernel entities.
//!
//! Each identifier wraps a UUID behind a unique domain marker via
//! [`domain_key::define_uuid!`], so a [`NodeId`] and an [`ExecutionId`]
//! cannot be confused at compile time even though both are 16-byte UUIDs
//! under the hood.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(pub WorkflowIdDomain => WorkflowId);
define_uuid!(pub NodeIdDomain => NodeId);
define_uuid!(pub EdgeIdDomain => EdgeId);
define_uuid!(pub ExecutionIdDomain => ExecutionId);
define_uuid!(pub UserIdDomain => UserId);
define_uuid!(pub CredentialIdDomain => CredentialId);
define_uuid!(pub HitlRequestIdDomain => HitlRequestId);

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Ports
//!
//! Backend interface traits (ports) for the Kestrel workflow kernel.
//!
//! This crate defines the **port** traits that backend drivers implement,
//! following the Ports & Adapters (hexagonal) pattern:
//!
//! - [`WorkflowRepo`] — persistence for workflow definitions.
//! - [`ExecutionRepo`] — execution state, journals, and leases.
//! - [`CredentialRepo`] — credential resolution scoped to the owning user.
//!
//! All traits are `async_trait` and object-safe, suitable for use as
//! `Box<dyn Trait>` or `Arc<dyn Trait>` behind dependency injection.

pub mod credential;
pub mod error;
pub mod execution;
pub mod workflow;

pub use credential::{CredentialRepo, ResolvedCredential};
pub use error::PortsError;
pub use execution::ExecutionRepo;
pub use workflow::WorkflowRepo;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check that every port trait is object-safe.
    #[test]
    fn traits_are_object_safe() {
        fn _assert_workflow_repo(_: &dyn WorkflowRepo) {}
        fn _assert_execution_repo(_: &dyn ExecutionRepo) {}
        fn _assert_credential_repo(_: &dyn CredentialRepo) {}
    }

    /// Compile-time check that every port trait works as `Box<dyn Trait>`.
    #[test]
    fn traits_work_as_boxed_dyn() {
        fn _takes_workflow(_: Box<dyn WorkflowRepo>) {}
        fn _takes_execution(_: Box<dyn ExecutionRepo>) {}
        fn _takes_credential(_: Box<dyn CredentialRepo>) {}
    }

    /// Compile-time check that every port trait works as `Arc<dyn Trait>`.
    #[test]
    fn traits_work_as_arc_dyn() {
        use std::sync::Arc;
        fn _takes_workflow(_: Arc<dyn WorkflowRepo>) {}
        fn _takes_execution(_: Arc<dyn ExecutionRepo>) {}
        fn _takes_credential(_: Arc<dyn CredentialRepo>) {}
    }
}

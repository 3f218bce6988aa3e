#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Compiler
//!
//! Validates a [`kestrel_workflow::Workflow`] against a [`kestrel_node::NodeRegistry`]
//! and the invoking user's available credentials, producing a handler-bound
//! [`ExecutionPlan`] or a typed [`CompilationError`].
//!
//! The pipeline runs fail-fast, in order:
//! structural checks, loop-aware cycle legality, orphan detection, credential
//! binding, config shape validation, a soft type-compatibility pass, and
//! finally a deterministic topological ordering over the loop-condensed
//! graph.

pub mod compile;
pub mod credential;
pub mod error;
pub mod plan;

pub use compile::{compile, CompileOutput};
pub use credential::AvailableCredential;
pub use error::{CompilationError, CompilationWarning};
pub use plan::{BoundNode, ExecutionPlan};

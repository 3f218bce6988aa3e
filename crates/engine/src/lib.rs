#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Engine
//!
//! The Graph Runner: drives a compiled [`kestrel_compiler::ExecutionPlan`]
//! for one execution to a terminal [`kestrel_execution::ExecutionStatus`].
//!
//! This crate owns the dispatch loop — predecessor-gated readiness,
//! output-handle routing, per-attempt timeouts, retry backoff, and
//! loop-body re-entry — but never owns policy. Every suspension point
//! (pause, cancel, human-in-the-loop, partial-failure continuation) is
//! delegated to a [`RunnerHooks`] implementation supplied by the caller,
//! normally a Supervisor sitting one layer up.
//!
//! - [`GraphRunner`] — the driving loop
//! - [`RunnerHooks`] / [`Decision`] — the policy seam
//! - [`CredentialProvider`] — per-node credential resolution, owned by the
//!   caller
//! - [`resolve_templates`] — `{{ $input... }}` / `{{ $vars... }}` /
//!   `{{ $output... }}` resolution against a node's `config`
//! - [`EngineOutcome`] — the runner's final report

pub mod credentials;
pub mod error;
pub mod hooks;
pub mod outcome;
pub mod result;
pub mod runner;
pub mod template;

pub use credentials::{CredentialProvider, NoCredentials};
pub use error::EngineError;
pub use hooks::{Decision, NoopHooks, RunnerHooks};
pub use outcome::NodeOutcome;
pub use result::EngineOutcome;
pub use runner::GraphRunner;
pub use template::{resolve_templates, TemplateContext};

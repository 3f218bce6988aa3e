#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Supervisor
//!
//! The process-wide control plane ("the King"): compiles workflows through
//! [`kestrel_compiler`], drives each execution with a
//! [`kestrel_engine::GraphRunner`] on its own background task, and exposes
//! the external control surface — start, pause, resume, cancel, human
//! approval, status, and sub-workflow execution.
//!
//! [`Supervisor`] owns the only map from [`kestrel_core::ExecutionId`] to
//! live execution state; once an execution reaches a terminal status it is
//! dropped from that map. Everything it needs to control one
//! in-flight execution — the externally-visible [`ExecutionHandle`], the
//! cooperative [`pause::PauseGate`], the cancellation token, and any
//! outstanding [`hitl::PendingHitl`] — lives in one [`entry::ExecutionEntry`].

pub mod credentials;
pub mod entry;
pub mod error;
pub mod handle;
pub mod hitl;
pub mod hooks;
pub mod pause;
pub mod supervisor;

pub use credentials::ResolvedCredentials;
pub use entry::ExecutionEntry;
pub use error::{ControlError, KernelError};
pub use handle::ExecutionHandle;
pub use hitl::{HitlKind, HitlRequest, HitlStatus, PendingHitl};
pub use hooks::SupervisorHooks;
pub use pause::PauseGate;
pub use supervisor::Supervisor;

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Workflow
//!
//! The workflow data model (`Workflow`, `Node`, `Edge`) and the
//! `DependencyGraph` structural analysis (topological ordering,
//! strongly-connected-component detection) that the Compiler and Graph
//! Runner build on.
//!
//! This crate deliberately knows nothing about node *handlers*, loop
//! semantics, or execution — it is pure graph shape.

pub mod error;
pub mod graph;
pub mod model;

pub use error::WorkflowError;
pub use graph::DependencyGraph;
pub use model::{
    EdgeKind, ErrorPolicy, Mapping, Node, NodeState, Workflow, WorkflowSettings, DEFAULT_HANDLE,
};
pub use model::Edge;

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Kestrel Node
//!
//! The Node Handler Registry: the trait node implementations satisfy
//! ([`NodeHandler`]), the value they report back ([`NodeResult`]), the
//! errors they raise ([`HandlerError`]), and the process-wide lookup table
//! from a workflow node's `type_tag` to a concrete handler
//! ([`NodeRegistry`]).

pub mod context;
pub mod error;
pub mod handler;
pub mod metadata;
pub mod registry;
pub mod result;

pub use context::{NodeContext, SecretString};
pub use error::HandlerError;
pub use handler::NodeHandler;
pub use metadata::{FieldSchema, FieldType, NodeMetadata};
pub use registry::NodeRegistry;
pub use result::NodeResult;

//! The trait every node implementation satisfies.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::NodeContext;
use crate::error::HandlerError;
use crate::metadata::NodeMetadata;
use crate::result::NodeResult;

/// A node handler: the executable behavior bound to a workflow node's
/// `type_tag`.
///
/// Implementors are registered into a [`crate::NodeRegistry`] and invoked
/// by the Graph Runner once per node attempt. `execute` receives the
/// resolved input (predecessor outputs merged per the routing rules) and
/// the node's own `config`, already validated against `metadata().declared_fields`
/// by the Compiler.
#[async_trait]
pub trait NodeHandler: Send + Sync + 'static {
    /// Run this node once.
    ///
    /// `input` is the merged output of upstream nodes (or the execution's
    /// top-level input, for entry nodes). `config` is this node's own
    /// `config` object, template-resolved against the execution's current
    /// variables and node outputs.
    async fn execute(
        &self,
        input: Value,
        config: Value,
        ctx: NodeContext,
    ) -> Result<NodeResult, HandlerError>;

    /// This node type's static metadata.
    fn metadata(&self) -> &NodeMetadata;
}

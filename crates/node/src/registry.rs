//! Process-wide mapping from node-type tag to handler, with lazy
//! registration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::NodeHandler;
use crate::metadata::NodeMetadata;

/// Resolves a workflow node's `type_tag` to a concrete [`NodeHandler`].
///
/// The Compiler and Graph Runner both consult this registry: the Compiler
/// to validate `config` shape and credential requirements at compile time,
/// the Graph Runner to actually invoke a handler.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use kestrel_node::{NodeHandler, NodeMetadata, NodeResult, NodeContext, HandlerError, NodeRegistry};
///
/// struct NoOp(NodeMetadata);
///
/// #[async_trait]
/// impl NodeHandler for NoOp {
///     async fn execute(&self, _input: serde_json::Value, _config: serde_json::Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
///         Ok(NodeResult::empty())
///     }
///     fn metadata(&self) -> &NodeMetadata { &self.0 }
/// }
///
/// let mut registry = NodeRegistry::new();
/// registry.register(Arc::new(NoOp(NodeMetadata::new("noop", "No-Op", "Does nothing"))));
///
/// assert!(registry.get("noop").is_some());
/// assert!(registry.get("unknown").is_none());
/// ```
#[derive(Default)]
pub struct NodeRegistry {
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its `metadata().type_tag`. Overwrites any
    /// existing handler registered under the same tag.
    pub fn register(&mut self, handler: Arc<dyn NodeHandler>) {
        let tag = handler.metadata().type_tag.clone();
        self.handlers.insert(tag, handler);
    }

    /// Look up a handler by type tag.
    #[must_use]
    pub fn get(&self, type_tag: &str) -> Option<&Arc<dyn NodeHandler>> {
        self.handlers.get(type_tag)
    }

    /// `true` if a handler is registered under `type_tag`.
    #[must_use]
    pub fn contains(&self, type_tag: &str) -> bool {
        self.handlers.contains_key(type_tag)
    }

    /// Metadata for every registered handler.
    #[must_use]
    pub fn list(&self) -> Vec<&NodeMetadata> {
        self.handlers.values().map(|h| h.metadata()).collect()
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove a handler by type tag, returning it if present.
    pub fn unregister(&mut self, type_tag: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.remove(type_tag)
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("count", &self.handlers.len())
            .field("type_tags", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

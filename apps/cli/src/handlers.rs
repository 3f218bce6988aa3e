//! A handful of trivial node handlers used to exercise the kernel from the
//! command line. None of these model a real integration — `kestrel-node`'s
//! contract deliberately keeps concrete handlers out of the kernel crates.

use async_trait::async_trait;
use kestrel_node::{HandlerError, NodeContext, NodeHandler, NodeMetadata, NodeRegistry, NodeResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Passes its input straight through under the `"default"` handle.
struct Echo(NodeMetadata);

#[async_trait]
impl NodeHandler for Echo {
    async fn execute(&self, input: Value, _config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
        let mut data = Map::new();
        data.insert("value".into(), input);
        Ok(NodeResult::default_handle(data))
    }

    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }
}

/// Sleeps for `config.ms` (default 1000) before passing its input through,
/// cooperatively cancellable.
struct Delay(NodeMetadata);

#[async_trait]
impl NodeHandler for Delay {
    async fn execute(&self, input: Value, config: Value, ctx: NodeContext) -> Result<NodeResult, HandlerError> {
        let ms = config.get("ms").and_then(Value::as_u64).unwrap_or(1000);
        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(ms)) => {}
            () = ctx.cancellation.cancelled() => return Err(HandlerError::Cancelled),
        }
        let mut data = Map::new();
        data.insert("value".into(), input);
        Ok(NodeResult::default_handle(data))
    }

    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }
}

/// Always fails fatally, for exercising `error_policy` from the command line.
struct AlwaysFail(NodeMetadata);

#[async_trait]
impl NodeHandler for AlwaysFail {
    async fn execute(&self, _input: Value, config: Value, _ctx: NodeContext) -> Result<NodeResult, HandlerError> {
        let message = config
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("demo.fail always fails")
            .to_string();
        Err(HandlerError::fatal(message))
    }

    fn metadata(&self) -> &NodeMetadata {
        &self.0
    }
}

/// Build the registry of demonstration node types the CLI binds against:
/// `demo.echo`, `demo.delay`, and `demo.fail`.
#[must_use]
pub fn demo_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    registry.register(Arc::new(Echo(NodeMetadata::new(
        "demo.echo",
        "Echo",
        "Passes its input through unchanged",
    ))));
    registry.register(Arc::new(Delay(NodeMetadata::new(
        "demo.delay",
        "Delay",
        "Sleeps for config.ms then passes its input through",
    ))));
    registry.register(Arc::new(AlwaysFail(NodeMetadata::new(
        "demo.fail",
        "Always Fail",
        "Fails fatally with config.message",
    ))));
    registry
}

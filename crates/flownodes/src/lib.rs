//! Standard node library
//!
//! Collection of built-in executors for common operations

mod constant;
mod debug;
mod http;
mod text;
mod time;
mod transform;

pub use constant::{ConstNode, InputNode};
pub use debug::DebugNode;
pub use http::HttpRequestNode;
pub use text::TemplateNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};
use flowruntime::ExecutorRegistry;

use std::sync::Arc;

/// Register all standard nodes with a registry
pub fn register_all(registry: &mut ExecutorRegistry) {
    registry.register(Arc::new(ConstNode));
    for input in InputNode::all() {
        registry.register(Arc::new(input));
    }
    registry.register(Arc::new(TemplateNode));
    registry.register(Arc::new(DebugNode));
    registry.register(Arc::new(HttpRequestNode::new()));
    registry.register(Arc::new(JsonParseNode));
    registry.register(Arc::new(JsonStringifyNode));
    registry.register(Arc::new(DelayNode));
}

/// Registry holding every standard node
pub fn standard_registry() -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    register_all(&mut registry);
    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use flowcore::{EventEmitter, NodeContext, Value};
    use tokio_util::sync::CancellationToken;

    /// Context for running an executor outside the engine
    pub fn context(input: Value) -> NodeContext {
        let input = match input {
            Value::Object(map) => map,
            other => panic!("test input must be an object, got {}", other),
        };
        NodeContext {
            node_id: "test".to_string(),
            node_type: "test".to_string(),
            input,
            attempt: 1,
            events: EventEmitter::detached("test"),
            cancellation: CancellationToken::new(),
        }
    }
}

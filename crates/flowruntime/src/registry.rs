use flowcore::{NodeExecutor, NodeMetadata};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of executors keyed by node type tag.
#[derive(Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
    metadata: HashMap<String, NodeMetadata>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    /// Register an executor under its own type tag, replacing any previous
    /// executor for that tag.
    pub fn register(&mut self, executor: Arc<dyn NodeExecutor>) {
        let node_type = executor.node_type().to_string();
        tracing::info!("Registering node type: {}", node_type);
        self.metadata.insert(node_type.clone(), executor.metadata());
        self.executors.insert(node_type, executor);
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeExecutor>> {
        self.executors.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.executors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<&NodeMetadata> {
        self.metadata.get(node_type)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowcore::{NodeContext, NodeError, NodeOutput, PortDefinition, ValueType};

    struct Echo(&'static str);

    #[async_trait]
    impl NodeExecutor for Echo {
        fn node_type(&self) -> &str {
            self.0
        }

        async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
            Ok(NodeOutput::single(ctx.node_id))
        }

        fn metadata(&self) -> NodeMetadata {
            NodeMetadata {
                description: "echo".to_string(),
                outputs: vec![PortDefinition::new("default", Some(ValueType::Text))],
                ..NodeMetadata::default()
            }
        }
    }

    #[test]
    fn lookup_by_type_tag() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(Echo("b.echo")));
        registry.register(Arc::new(Echo("a.echo")));

        assert!(registry.contains("a.echo"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.list_node_types(), vec!["a.echo", "b.echo"]);
        assert_eq!(
            registry.get_metadata("a.echo").map(|m| m.description.as_str()),
            Some("echo")
        );
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(Echo("echo")));
        registry.register(Arc::new(Echo("echo")));
        assert_eq!(registry.len(), 1);
    }
}

use async_trait::async_trait;
use flowcore::{
    json_kind, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, PortDefinition,
    Value, ValueType,
};

/// Emits a fixed value
pub struct ConstNode;

#[async_trait]
impl NodeExecutor for ConstNode {
    fn node_type(&self) -> &str {
        "const"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        // Without an explicit value the whole input is the constant.
        let value = match ctx.input.get("value") {
            Some(value) => value.clone(),
            None => Value::Object(ctx.input),
        };
        Ok(NodeOutput::single(value))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Emit data.value, or the whole node data, unchanged".to_string(),
            category: "input".to_string(),
            ..NodeMetadata::default()
        }
    }
}

/// Typed workflow input (`input.text`, `input.image`, ...).
///
/// The value comes from `data.value`, usually a `{{variable}}` placeholder,
/// and must already have the JSON shape of the declared type.
pub struct InputNode {
    value_type: ValueType,
    node_type: String,
}

impl InputNode {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            node_type: format!("input.{}", value_type),
        }
    }

    /// One input node per value type
    pub fn all() -> Vec<InputNode> {
        ValueType::ALL.iter().copied().map(InputNode::new).collect()
    }
}

#[async_trait]
impl NodeExecutor for InputNode {
    fn node_type(&self) -> &str {
        &self.node_type
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?;
        if !self.value_type.accepts(value) {
            return Err(NodeError::InvalidInputType {
                field: "value".to_string(),
                expected: self.value_type.to_string(),
                actual: json_kind(value).to_string(),
            });
        }
        Ok(NodeOutput::single(value.clone()))
    }

    fn metadata(&self) -> NodeMetadata {
        let description = if self.value_type.is_media() {
            format!("Provide a {} reference (URL or data URI)", self.value_type)
        } else {
            format!("Provide a {} value", self.value_type)
        };
        NodeMetadata {
            description,
            category: "input".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::new("default", Some(self.value_type))],
        }
    }
}

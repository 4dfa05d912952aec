use async_trait::async_trait;
use flowcore::{
    NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, PortDefinition, Value,
    ValueType,
};

/// Parse JSON string to Value
pub struct JsonParseNode;

#[async_trait]
impl NodeExecutor for JsonParseNode {
    fn node_type(&self) -> &str {
        "transform.json_parse"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let input = ctx.require_str("json")?;

        let parsed: Value = serde_json::from_str(input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))?;

        Ok(NodeOutput::new().with_output("parsed", parsed))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Parse JSON string".to_string(),
            category: "transform".to_string(),
            inputs: vec![PortDefinition::new("json", Some(ValueType::Text)).required()],
            outputs: vec![PortDefinition::new("parsed", None)],
        }
    }
}

/// Stringify Value to JSON
pub struct JsonStringifyNode;

#[async_trait]
impl NodeExecutor for JsonStringifyNode {
    fn node_type(&self) -> &str {
        "transform.json_stringify"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let value = ctx.require_input("value")?;
        let pretty = ctx.get_or("pretty", Value::Bool(true)).as_bool().unwrap_or(true);

        let rendered = if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        let json_str = rendered
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))?;

        Ok(NodeOutput::new().with_output("json", json_str))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Convert value to JSON string".to_string(),
            category: "transform".to_string(),
            inputs: vec![PortDefinition::new("value", None).required()],
            outputs: vec![PortDefinition::new("json", Some(ValueType::Text))],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[tokio::test]
    async fn parse_then_stringify() {
        let parsed = JsonParseNode
            .execute(context(json!({ "json": r#"{"a":[1,2]}"# })))
            .await
            .unwrap();
        assert_eq!(parsed.get("parsed"), Some(&json!({ "a": [1, 2] })));

        let compact = JsonStringifyNode
            .execute(context(json!({ "value": { "a": [1, 2] }, "pretty": false })))
            .await
            .unwrap();
        assert_eq!(compact.get("json"), Some(&json!(r#"{"a":[1,2]}"#)));
    }

    #[tokio::test]
    async fn malformed_json_is_a_terminal_failure() {
        let err = JsonParseNode
            .execute(context(json!({ "json": "{not json" })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::ExecutionFailed(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn ports_default_to_first_declared() {
        let meta = JsonParseNode.metadata();
        assert_eq!(meta.input_port(None).value_type(), Some(ValueType::Text));
        assert_eq!(meta.output_port(None).value_type(), None);
    }
}

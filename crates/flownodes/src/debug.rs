use async_trait::async_trait;
use flowcore::{
    display_value, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, Value,
};

/// Simple debug node that logs its input and passes it through
pub struct DebugNode;

#[async_trait]
impl NodeExecutor for DebugNode {
    fn node_type(&self) -> &str {
        "debug.log"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let message = ctx
            .input
            .get("message")
            .map(display_value)
            .unwrap_or_else(|| "(no message)".to_string());

        tracing::info!(node_id = %ctx.node_id, "DEBUG: {}", message);
        ctx.events.info(format!("DEBUG: {}", message));
        for (key, value) in &ctx.input {
            ctx.events.info(format!("  {}: {}", key, value));
        }

        Ok(NodeOutput::single(Value::Object(ctx.input)).with_output("message", message))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Logs input values for debugging".to_string(),
            category: "debug".to_string(),
            ..NodeMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[tokio::test]
    async fn passes_input_through() {
        let output = DebugNode
            .execute(context(json!({ "message": 42, "extra": true })))
            .await
            .unwrap();
        assert_eq!(output.get("message"), Some(&json!("42")));
        assert_eq!(
            output.get("default"),
            Some(&json!({ "message": 42, "extra": true }))
        );
    }

    #[tokio::test]
    async fn placeholder_message_when_absent() {
        let output = DebugNode.execute(context(json!({}))).await.unwrap();
        assert_eq!(output.get("message"), Some(&json!("(no message)")));
    }
}

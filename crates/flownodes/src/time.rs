use async_trait::async_trait;
use flowcore::{json_kind, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput};
use tokio::time::{sleep, Duration};

const DEFAULT_DELAY_MS: u64 = 1000;

/// Delay execution for a specified duration
pub struct DelayNode;

#[async_trait]
impl NodeExecutor for DelayNode {
    fn node_type(&self) -> &str {
        "time.delay"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let delay_ms = match ctx.input.get("delay_ms") {
            None => DEFAULT_DELAY_MS,
            Some(value) => value.as_u64().ok_or_else(|| NodeError::InvalidInputType {
                field: "delay_ms".to_string(),
                expected: "non-negative integer".to_string(),
                actual: json_kind(value).to_string(),
            })?,
        };

        ctx.events.info(format!("Delaying for {}ms", delay_ms));

        tokio::select! {
            _ = ctx.cancellation.cancelled() => return Err(NodeError::Cancelled),
            _ = sleep(Duration::from_millis(delay_ms)) => {}
        }

        // Pass through any inputs
        Ok(NodeOutput {
            outputs: ctx.input.into_iter().collect(),
        })
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Delay execution for specified milliseconds".to_string(),
            category: "time".to_string(),
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
    async fn passes_inputs_to_same_named_ports() {
        let output = DelayNode
            .execute(context(json!({ "delay_ms": 1, "default": "payload" })))
            .await
            .unwrap();
        assert_eq!(output.get("default"), Some(&json!("payload")));
    }

    #[tokio::test]
    async fn cancellation_interrupts_sleep() {
        let ctx = context(json!({ "delay_ms": 60_000 }));
        ctx.cancellation.cancel();
        let err = DelayNode.execute(ctx).await.unwrap_err();
        assert_eq!(err, NodeError::Cancelled);
    }

    #[tokio::test]
    async fn rejects_negative_delay() {
        let err = DelayNode
            .execute(context(json!({ "delay_ms": -5 })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidInputType { .. }));
    }
}

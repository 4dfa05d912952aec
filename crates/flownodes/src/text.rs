use async_trait::async_trait;
use flowcore::{
    NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, PortDefinition, ValueType,
};

/// Emits its `template` as text.
///
/// Placeholders in the template are resolved by the engine before the node
/// runs, so by the time `execute` sees it the template is final.
pub struct TemplateNode;

#[async_trait]
impl NodeExecutor for TemplateNode {
    fn node_type(&self) -> &str {
        "text.template"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let text = ctx.require_str("template")?;
        ctx.events.info(format!("Rendered {} characters", text.chars().count()));
        Ok(NodeOutput::single(text.to_string()))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Render a {{variable}} template to text".to_string(),
            category: "text".to_string(),
            inputs: vec![],
            outputs: vec![PortDefinition::new("default", Some(ValueType::Text))
                .describe("The rendered template")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[tokio::test]
    async fn emits_template_text() {
        let output = TemplateNode
            .execute(context(json!({ "template": "a cat in a hat" })))
            .await
            .unwrap();
        assert_eq!(output.get("default"), Some(&json!("a cat in a hat")));
    }

    #[tokio::test]
    async fn non_string_template_is_rejected() {
        let err = TemplateNode
            .execute(context(json!({ "template": 5 })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            NodeError::InvalidInputType {
                field: "template".to_string(),
                expected: "string".to_string(),
                actual: "number".to_string(),
            }
        );
    }
}

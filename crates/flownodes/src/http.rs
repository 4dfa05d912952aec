use async_trait::async_trait;
use flowcore::{
    json_kind, NodeContext, NodeError, NodeExecutor, NodeMetadata, NodeOutput, PortDefinition,
    Value, ValueType,
};
use reqwest::{Method, StatusCode, Url};
use serde_json::Map;
use std::time::Duration;

/// HTTP request node
pub struct HttpRequestNode {
    client: reqwest::Client,
}

impl HttpRequestNode {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRequestNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a send error onto the retry taxonomy: connection and timeout
/// problems may clear up, anything else will not.
fn classify_send_error(err: reqwest::Error) -> NodeError {
    if err.is_timeout() || err.is_connect() {
        NodeError::Transient(format!("HTTP request failed: {}", err))
    } else {
        NodeError::ExecutionFailed(format!("HTTP request failed: {}", err))
    }
}

/// 429 and 5xx are worth retrying; other non-success statuses are final.
fn classify_status(status: StatusCode) -> Result<(), NodeError> {
    if status.is_success() || status.is_redirection() || status.is_informational() {
        Ok(())
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Err(NodeError::Transient(format!("HTTP {}", status)))
    } else {
        Err(NodeError::ExecutionFailed(format!("HTTP {}", status)))
    }
}

#[async_trait]
impl NodeExecutor for HttpRequestNode {
    fn node_type(&self) -> &str {
        "http.request"
    }

    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError> {
        let url = ctx.require_str("url")?;
        let url = Url::parse(url)
            .map_err(|e| NodeError::Configuration(format!("Invalid url '{}': {}", url, e)))?;

        let method_value = ctx.get_or("method", Value::String("GET".to_string()));
        let method_name = method_value.as_str().unwrap_or("GET").to_uppercase();
        let method = match method_name.as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "PATCH" => Method::PATCH,
            "DELETE" => Method::DELETE,
            other => {
                return Err(NodeError::Configuration(format!(
                    "Unsupported method: {}",
                    other
                )))
            }
        };

        ctx.events.info(format!("{} {}", method, url));
        let mut request = self.client.request(method, url);

        match ctx.input.get("body") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => request = request.body(text.clone()),
            Some(json) => request = request.json(json),
        }

        if let Some(headers) = ctx.input.get("headers") {
            let Value::Object(headers) = headers else {
                return Err(NodeError::InvalidInputType {
                    field: "headers".to_string(),
                    expected: "object".to_string(),
                    actual: json_kind(headers).to_string(),
                });
            };
            for (key, value) in headers {
                if let Some(val_str) = value.as_str() {
                    request = request.header(key, val_str);
                }
            }
        }

        if let Some(ms) = ctx.input.get("timeout_ms").and_then(Value::as_u64) {
            request = request.timeout(Duration::from_millis(ms));
        }

        let response = request.send().await.map_err(classify_send_error)?;

        let status = response.status();
        classify_status(status)?;

        let headers_map: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.to_string(),
                    Value::String(v.to_str().unwrap_or_default().to_string()),
                )
            })
            .collect();

        let body_text = response.text().await.map_err(classify_send_error)?;

        ctx.events.info(format!("Response status: {}", status.as_u16()));

        let mut output = NodeOutput::new()
            .with_output("status", status.as_u16())
            .with_output("headers", Value::Object(headers_map));
        if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
            output = output.with_output("json", json);
        }
        Ok(output.with_output("body", body_text))
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "http".to_string(),
            inputs: vec![],
            outputs: vec![
                PortDefinition::new("body", Some(ValueType::Text)),
                PortDefinition::new("status", Some(ValueType::Number)),
                PortDefinition::new("json", None).describe("Body parsed as JSON, when it is JSON"),
                PortDefinition::new("headers", None),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context;
    use serde_json::json;

    #[test]
    fn throttling_and_server_errors_are_transient() {
        for code in [429u16, 500, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(classify_status(status).unwrap_err().is_retryable(), "{}", code);
        }
        for code in [400u16, 401, 404, 422] {
            let status = StatusCode::from_u16(code).unwrap();
            assert!(!classify_status(status).unwrap_err().is_retryable(), "{}", code);
        }
        assert!(classify_status(StatusCode::OK).is_ok());
    }

    #[tokio::test]
    async fn bad_url_is_a_configuration_error() {
        let err = HttpRequestNode::new()
            .execute(context(json!({ "url": "not a url" })))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Configuration(_)));
    }

    #[tokio::test]
    async fn unsupported_method_is_rejected() {
        let err = HttpRequestNode::new()
            .execute(context(json!({ "url": "http://localhost/", "method": "brew" })))
            .await
            .unwrap_err();
        assert_eq!(err, NodeError::Configuration("Unsupported method: BREW".to_string()));
    }

    #[tokio::test]
    async fn refused_connection_is_transient() {
        let err = HttpRequestNode::new()
            .execute(context(json!({ "url": "http://127.0.0.1:1/", "timeout_ms": 2000 })))
            .await
            .unwrap_err();
        assert!(err.is_retryable(), "{:?}", err);
    }

    #[test]
    fn default_output_port_is_body() {
        let meta = HttpRequestNode::new().metadata();
        assert_eq!(meta.output_port(None).value_type(), Some(ValueType::Text));
    }
}

use crate::{FlowError, Value, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Port name used when an edge carries no handle.
pub const DEFAULT_PORT: &str = "default";

/// Request limits enforced before a workflow reaches the engine.
pub const MAX_NODES: usize = 100;
pub const MAX_EDGES: usize = 500;

/// A complete execution request: the graph plus its variable set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRequest {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl WorkflowRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> String {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    /// Connect two nodes, generating the edge id from its endpoints.
    pub fn connect(
        &mut self,
        source: impl Into<String>,
        source_handle: Option<&str>,
        target: impl Into<String>,
        target_handle: Option<&str>,
    ) {
        let source = source.into();
        let target = target.into();
        let id = format!("e-{}-{}-{}", source, target, self.edges.len());
        self.edges.push(Edge {
            id,
            source,
            target,
            source_handle: source_handle.map(str::to_string),
            target_handle: target_handle.map(str::to_string),
        });
    }

    pub fn add_variable(&mut self, variable: Variable) {
        self.variables.push(variable);
    }

    /// Cardinality and non-empty field checks. Structural validation
    /// (dangling edges, cycles, port types) belongs to the engine.
    pub fn validate_shape(&self) -> Result<(), FlowError> {
        let mut problems = Vec::new();

        if self.nodes.len() > MAX_NODES {
            problems.push(format!(
                "too many nodes: {} (max {})",
                self.nodes.len(),
                MAX_NODES
            ));
        }
        if self.edges.len() > MAX_EDGES {
            problems.push(format!(
                "too many edges: {} (max {})",
                self.edges.len(),
                MAX_EDGES
            ));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                problems.push(format!("nodes[{}]: id must not be empty", i));
            }
            if node.node_type.trim().is_empty() {
                problems.push(format!("nodes[{}]: type must not be empty", i));
            }
        }
        for (i, edge) in self.edges.iter().enumerate() {
            if edge.id.trim().is_empty() {
                problems.push(format!("edges[{}]: id must not be empty", i));
            }
            if edge.source.trim().is_empty() || edge.target.trim().is_empty() {
                problems.push(format!("edges[{}]: source and target are required", i));
            }
        }
        for (i, variable) in self.variables.iter().enumerate() {
            if variable.name.trim().is_empty() {
                problems.push(format!("variables[{}]: name must not be empty", i));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FlowError::InvalidRequest(problems.join("; ")))
        }
    }
}

/// A node as authored in the visual editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            position: None,
            data: Map::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Position { x, y });
        self
    }
}

/// A directed data dependency between two node ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_handles(mut self, source: Option<&str>, target: Option<&str>) -> Self {
        self.source_handle = source.map(str::to_string);
        self.target_handle = target.map(str::to_string);
        self
    }

    pub fn source_port(&self) -> &str {
        self.source_handle.as_deref().unwrap_or(DEFAULT_PORT)
    }

    pub fn target_port(&self) -> &str {
        self.target_handle.as_deref().unwrap_or(DEFAULT_PORT)
    }
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A named, typed value available to placeholders during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: ValueType,
    #[serde(default)]
    pub value: Value,
}

impl Variable {
    pub fn new(name: impl Into<String>, var_type: ValueType, value: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            id: format!("var-{}", name),
            name,
            var_type,
            value: value.into(),
        }
    }
}

/// Bounded exponential backoff for node attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// A single attempt, never retried.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_multiplier: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edges_use_camel_case_handles() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "e1",
            "source": "a",
            "target": "b",
            "sourceHandle": "image",
        }))
        .unwrap();

        assert_eq!(edge.source_port(), "image");
        assert_eq!(edge.target_port(), DEFAULT_PORT);
        let back = serde_json::to_value(&edge).unwrap();
        assert_eq!(back["sourceHandle"], json!("image"));
        assert!(back.get("targetHandle").is_none());
    }

    #[test]
    fn nodes_and_variables_read_editor_payloads() {
        let request: WorkflowRequest = serde_json::from_value(json!({
            "nodes": [
                {"id": "a", "type": "text.template", "position": {"x": 10, "y": 20},
                 "data": {"template": "Hello {{name}}"}}
            ],
            "variables": [{"id": "v1", "name": "name", "type": "text", "value": "World"}]
        }))
        .unwrap();

        assert_eq!(request.nodes[0].node_type, "text.template");
        assert_eq!(request.nodes[0].position, Some(Position { x: 10.0, y: 20.0 }));
        assert!(request.edges.is_empty());
        assert_eq!(request.variables[0].var_type, ValueType::Text);
    }

    #[test]
    fn shape_validation_enforces_limits() {
        let mut request = WorkflowRequest::new();
        for i in 0..=MAX_NODES {
            request.add_node(Node::new(format!("n{}", i), "const"));
        }
        let err = request.validate_shape().unwrap_err();
        assert!(err.to_string().contains("too many nodes"));
    }

    #[test]
    fn shape_validation_rejects_blank_fields() {
        let mut request = WorkflowRequest::new();
        request.add_node(Node::new("", "const"));
        request.add_node(Node::new("b", " "));
        request.connect("a", None, "", None);

        let message = request.validate_shape().unwrap_err().to_string();
        assert!(message.contains("nodes[0]: id must not be empty"));
        assert!(message.contains("nodes[1]: type must not be empty"));
        assert!(message.contains("edges[0]: source and target are required"));
    }

    #[test]
    fn connect_generates_unique_edge_ids() {
        let mut request = WorkflowRequest::new();
        request.connect("a", None, "b", None);
        request.connect("a", None, "b", Some("prompt"));
        assert_ne!(request.edges[0].id, request.edges[1].id);
        assert_eq!(request.edges[1].target_port(), "prompt");
        assert!(request.validate_shape().is_ok());
    }
}

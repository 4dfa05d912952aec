use crate::{events::EventEmitter, json_kind, NodeError, Value, ValueType, DEFAULT_PORT};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Capability that runs one node type.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Type tag this executor serves (e.g. "http.request", "input.image")
    fn node_type(&self) -> &str;

    /// Execute the node against its resolved input
    async fn execute(&self, ctx: NodeContext) -> Result<NodeOutput, NodeError>;

    /// Optional: describe ports so edges can be type checked
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }
}

/// Execution context passed to each node attempt
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: String,

    pub node_type: String,

    /// Node data merged with upstream values, placeholders resolved
    pub input: Map<String, Value>,

    /// 1-based attempt number
    pub attempt: u32,

    /// Event emitter for real-time updates
    pub events: EventEmitter,

    /// Cancelled when the run is aborted or times out
    pub cancellation: CancellationToken,
}

impl NodeContext {
    /// Get required input or return error
    pub fn require_input(&self, name: &str) -> Result<&Value, NodeError> {
        self.input
            .get(name)
            .ok_or_else(|| NodeError::MissingInput(name.to_string()))
    }

    /// Get a required string input
    pub fn require_str(&self, name: &str) -> Result<&str, NodeError> {
        let value = self.require_input(name)?;
        value.as_str().ok_or_else(|| NodeError::InvalidInputType {
            field: name.to_string(),
            expected: "string".to_string(),
            actual: json_kind(value).to_string(),
        })
    }

    /// Get input with default
    pub fn get_or(&self, name: &str, default: Value) -> Value {
        self.input.get(name).cloned().unwrap_or(default)
    }
}

/// Output port values produced by one successful execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub outputs: BTreeMap<String, Value>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, port: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(port.into(), value.into());
        self
    }

    /// Single value on the default port
    pub fn single(value: impl Into<Value>) -> Self {
        Self::new().with_output(DEFAULT_PORT, value)
    }

    pub fn get(&self, port: &str) -> Option<&Value> {
        self.outputs.get(port)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.outputs.clone().into_iter().collect())
    }
}

/// Static description of a node type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub description: String,
    pub category: String,
    pub inputs: Vec<PortDefinition>,
    pub outputs: Vec<PortDefinition>,
}

impl Default for NodeMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl NodeMetadata {
    /// Resolve the declared input port for an edge handle.
    pub fn input_port(&self, handle: Option<&str>) -> PortLookup<'_> {
        lookup_port(&self.inputs, handle)
    }

    /// Resolve the declared output port for an edge handle.
    pub fn output_port(&self, handle: Option<&str>) -> PortLookup<'_> {
        lookup_port(&self.outputs, handle)
    }
}

/// Outcome of matching an edge handle against declared ports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PortLookup<'a> {
    /// The node type declares no ports on this side
    Untyped,
    Found(&'a PortDefinition),
    Undeclared,
}

impl PortLookup<'_> {
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            PortLookup::Found(port) => port.value_type,
            _ => None,
        }
    }

    /// Port name an edge with `handle` reads from or writes to. Declared
    /// ports route by their own name, so an absent handle lands on the same
    /// port the type check used. `None` when the handle names no port.
    pub fn route(&self, handle: Option<&str>) -> Option<String> {
        match self {
            PortLookup::Found(port) => Some(port.name.clone()),
            PortLookup::Untyped => Some(handle.unwrap_or(DEFAULT_PORT).to_string()),
            PortLookup::Undeclared => None,
        }
    }
}

fn lookup_port<'a>(ports: &'a [PortDefinition], handle: Option<&str>) -> PortLookup<'a> {
    if ports.is_empty() {
        return PortLookup::Untyped;
    }
    let found = match handle {
        Some(name) => ports.iter().find(|p| p.name == name),
        None => ports
            .iter()
            .find(|p| p.name == DEFAULT_PORT)
            .or_else(|| ports.first()),
    };
    match found {
        Some(port) => PortLookup::Found(port),
        None => PortLookup::Undeclared,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    /// `None` accepts or produces any value
    pub value_type: Option<ValueType>,
    pub description: String,
    pub required: bool,
}

impl PortDefinition {
    pub fn new(name: impl Into<String>, value_type: Option<ValueType>) -> Self {
        Self {
            name: name.into(),
            value_type,
            description: String::new(),
            required: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> NodeMetadata {
        NodeMetadata {
            outputs: vec![
                PortDefinition::new("status", Some(ValueType::Number)),
                PortDefinition::new("body", Some(ValueType::Text)),
            ],
            ..NodeMetadata::default()
        }
    }

    #[test]
    fn absent_handle_falls_back_to_first_port() {
        let meta = metadata();
        assert_eq!(meta.output_port(None).value_type(), Some(ValueType::Number));
        assert_eq!(meta.output_port(Some("body")).value_type(), Some(ValueType::Text));
    }

    #[test]
    fn undeclared_and_untyped_ports_are_distinguished() {
        let meta = metadata();
        assert_eq!(meta.output_port(Some("nope")), PortLookup::Undeclared);
        assert_eq!(meta.input_port(Some("anything")), PortLookup::Untyped);
    }

    #[test]
    fn default_port_wins_over_declaration_order() {
        let meta = NodeMetadata {
            inputs: vec![
                PortDefinition::new("mask", Some(ValueType::Image)),
                PortDefinition::new(DEFAULT_PORT, Some(ValueType::Text)),
            ],
            ..NodeMetadata::default()
        };
        assert_eq!(meta.input_port(None).value_type(), Some(ValueType::Text));
    }

    #[test]
    fn absent_handle_routes_to_the_checked_port() {
        let meta = metadata();
        assert_eq!(meta.output_port(None).route(None).as_deref(), Some("status"));
        assert_eq!(
            meta.output_port(Some("body")).route(Some("body")).as_deref(),
            Some("body")
        );
        assert_eq!(meta.output_port(Some("nope")).route(Some("nope")), None);
        assert_eq!(
            meta.input_port(None).route(None).as_deref(),
            Some(DEFAULT_PORT)
        );
    }

    #[test]
    fn single_output_lands_on_default_port() {
        let output = NodeOutput::single("hi");
        assert_eq!(output.get(DEFAULT_PORT), Some(&Value::from("hi")));
        assert_eq!(output.to_value(), serde_json::json!({"default": "hi"}));
    }
}

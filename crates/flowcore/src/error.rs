use crate::ValueType;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Internal engine fault: {0}")]
    Internal(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors raised by a node executor, or by the engine on a node's behalf.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("{0}")]
    Unresolved(#[from] ResolutionError),

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    /// Default retry predicate: only transient and timeout-class failures
    /// are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NodeError::Transient(_) | NodeError::Timeout { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unresolved variables: {}", .names.join(", "))]
    MissingVariables { names: Vec<String> },
}

/// A structural or type problem found before any node runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphValidationError {
    #[error("Duplicate node id: {id}")]
    DuplicateNode { id: String },

    #[error("Edge '{edge_id}' references unknown {endpoint} node '{node_id}'")]
    DanglingEdge {
        edge_id: String,
        endpoint: EdgeEndpoint,
        node_id: String,
    },

    #[error("Cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("Edge '{edge_id}' connects incompatible ports: {source_type} -> {target_type}")]
    IncompatiblePorts {
        edge_id: String,
        source_type: ValueType,
        target_type: ValueType,
    },

    #[error("Node '{node_id}' has unknown type '{node_type}'")]
    UnknownNodeType { node_id: String, node_type: String },

    #[error("Edge '{edge_id}' references undeclared port '{handle}' on node '{node_id}'")]
    UnknownPort {
        edge_id: String,
        node_id: String,
        handle: String,
    },

    #[error("Duplicate variable name: {name}")]
    DuplicateVariable { name: String },

    #[error("Invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeEndpoint {
    Source,
    Target,
}

impl fmt::Display for EdgeEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeEndpoint::Source => f.write_str("source"),
            EdgeEndpoint::Target => f.write_str("target"),
        }
    }
}

/// Every validation problem found in one pass over a request.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", render(.errors))]
pub struct ValidationReport {
    pub errors: Vec<GraphValidationError>,
}

fn render(errors: &[GraphValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: GraphValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing was reported.
    pub fn into_result(self) -> Result<(), ValidationReport> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<GraphValidationError> for ValidationReport {
    fn from(error: GraphValidationError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

//! Core abstractions for the flow engine
//!
//! This crate provides the data model of a visual workflow (nodes, edges,
//! variables), the executor capability trait, run results and the error
//! taxonomy shared by every other crate. It has no scheduling logic.

mod error;
pub mod events;
mod node;
mod result;
mod value;
mod workflow;

pub use error::{
    EdgeEndpoint, FlowError, GraphValidationError, NodeError, ResolutionError, ValidationReport,
};
pub use events::*;
pub use node::{NodeContext, NodeExecutor, NodeMetadata, NodeOutput, PortDefinition, PortLookup};
pub use result::{NodeResult, NodeStatus, RunErrorKind, RunResult, SkipReason};
pub use value::{display_value, json_kind, Value, ValueType};
pub use workflow::{
    Edge, Node, Position, RetryPolicy, Variable, WorkflowRequest, DEFAULT_PORT, MAX_EDGES,
    MAX_NODES,
};

//! Workflow execution runtime
//!
//! This crate provides the engine that validates and runs workflow graphs:
//! dependency analysis, port type checking, variable resolution, retry with
//! backoff and bounded parallel dispatch through the executor registry.

mod config;
mod engine;
pub mod graph;
pub mod ports;
mod registry;
pub mod retry;
pub mod variables;

pub use config::EngineConfig;
pub use engine::{ExecutionEngine, ExecutionPlan};
pub use graph::DependencyGraph;
pub use ports::{are_ports_compatible, PortCompatibilityRegistry};
pub use registry::ExecutorRegistry;
pub use retry::{RetryDecision, RetryPredicate, RetryState};
pub use variables::{
    is_referenceable, referenced_names, resolve, resolve_map, ResolutionScope, VariableContext,
    VariableLookup,
};

use crate::{ExecutionId, Node, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle of a node within one run.
///
/// `Pending -> Running -> {Succeeded | Failed}` and `Pending -> Skipped` are
/// the only legal transitions. Everything but `Pending` and `Running` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeStatus::Succeeded | NodeStatus::Failed | NodeStatus::Skipped
        )
    }

    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Pending, NodeStatus::Running)
                | (NodeStatus::Pending, NodeStatus::Skipped)
                | (NodeStatus::Running, NodeStatus::Succeeded)
                | (NodeStatus::Running, NodeStatus::Failed)
        )
    }

    /// A dependency in this state blocks its dependents for good.
    pub fn blocks_dependents(self) -> bool {
        matches!(self, NodeStatus::Failed | NodeStatus::Skipped)
    }
}

/// Why a node never ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SkipReason {
    /// A direct dependency failed or was itself skipped
    UpstreamFailed { node_id: String },
    /// The run was cancelled before the node was dispatched
    Cancelled { reason: String },
}

impl SkipReason {
    pub fn message(&self) -> String {
        match self {
            SkipReason::UpstreamFailed { node_id } => {
                format!("skipped: upstream node '{}' did not succeed", node_id)
            }
            SkipReason::Cancelled { reason } => format!("skipped: {}", reason),
        }
    }
}

/// Per-node slot in a run's result map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    pub attempts: u32,
    pub duration_ms: u64,
}

impl NodeResult {
    pub fn pending() -> Self {
        Self {
            status: NodeStatus::Pending,
            output: None,
            error: None,
            skip_reason: None,
            attempts: 0,
            duration_ms: 0,
        }
    }
}

impl Default for NodeResult {
    fn default() -> Self {
        Self::pending()
    }
}

/// Category of a run-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunErrorKind {
    /// The graph or variables were rejected; nothing ran
    Validation,
    /// At least one node failed
    Execution,
    /// The run was aborted or hit its deadline
    Cancelled,
    /// The engine itself misbehaved; no per-node detail
    Internal,
}

/// Outcome of one `execute` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<String>>,
    /// Input nodes in execution order with resolved data and outputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<BTreeMap<String, NodeResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RunErrorKind>,
    pub duration_ms: u64,
}

impl RunResult {
    /// A run that failed as a whole, with no per-node breakdown.
    pub fn failed(
        execution_id: ExecutionId,
        kind: RunErrorKind,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: false,
            execution_id,
            order: None,
            nodes: None,
            results: None,
            error: Some(error.into()),
            error_kind: Some(kind),
            duration_ms,
        }
    }

    pub fn status_of(&self, node_id: &str) -> Option<NodeStatus> {
        self.results
            .as_ref()
            .and_then(|results| results.get(node_id))
            .map(|r| r.status)
    }

    pub fn result_of(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.as_ref().and_then(|results| results.get(node_id))
    }
}

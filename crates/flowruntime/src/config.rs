use flowcore::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the execution engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on node tasks running at once (minimum 1)
    pub max_parallel_nodes: usize,
    pub retry: RetryPolicy,
    /// Per-attempt timeout; expiry counts as a retryable failure
    pub node_timeout_ms: Option<u64>,
    /// Deadline for the whole run; expiry cancels it
    pub max_execution_time_ms: Option<u64>,
    pub event_buffer_size: usize,
}

impl EngineConfig {
    pub fn with_max_parallel(mut self, max_parallel_nodes: usize) -> Self {
        self.max_parallel_nodes = max_parallel_nodes;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.max_execution_time_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub(crate) fn parallelism(&self) -> usize {
        self.max_parallel_nodes.max(1)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 10,
            retry: RetryPolicy::default(),
            node_timeout_ms: None,
            max_execution_time_ms: None,
            event_buffer_size: 1000,
        }
    }
}

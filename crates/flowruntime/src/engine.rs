use crate::config::EngineConfig;
use crate::graph::DependencyGraph;
use crate::ports::PortCompatibilityRegistry;
use crate::registry::ExecutorRegistry;
use crate::retry::{RetryDecision, RetryPredicate, RetryState};
use crate::variables::{resolve_map, ResolutionScope, VariableContext};
use chrono::Utc;
use flowcore::{
    Edge, EventBus, ExecutionEvent, ExecutionId, FlowError, GraphValidationError, Node,
    NodeContext, NodeError, NodeExecutor, NodeOutput, NodeResult, NodeStatus, ResolutionError,
    RetryPolicy, RunErrorKind, RunResult, SkipReason, ValidationReport, Value, Variable,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Map;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// A request that passed validation, with its execution order.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub graph: DependencyGraph,
    pub order: Vec<String>,
    pub variables: VariableContext,
}

/// Executes workflow graphs with bounded parallelism and per-node retry.
///
/// One engine serves any number of concurrent runs; every run gets its own
/// graph, variable context and result map.
pub struct ExecutionEngine {
    registry: Arc<ExecutorRegistry>,
    config: EngineConfig,
    ports: PortCompatibilityRegistry,
    retry_predicate: RetryPredicate,
    event_bus: Arc<EventBus>,
}

impl ExecutionEngine {
    /// Create an engine with default settings
    pub fn new(registry: ExecutorRegistry) -> Self {
        Self::with_config(Arc::new(registry), EngineConfig::default())
    }

    pub fn with_config(registry: Arc<ExecutorRegistry>, config: EngineConfig) -> Self {
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        Self {
            registry,
            config,
            ports: PortCompatibilityRegistry::new(),
            retry_predicate: RetryPredicate::default(),
            event_bus,
        }
    }

    /// Replace the default retryable-error predicate
    pub fn with_retry_predicate(mut self, predicate: RetryPredicate) -> Self {
        self.retry_predicate = predicate;
        self
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribe to execution events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Check structure, node types, port types and variables, collecting
    /// every problem, then compute the execution order.
    pub fn validate(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        variables: &[Variable],
    ) -> Result<ExecutionPlan, ValidationReport> {
        let mut report = ValidationReport::new();

        let mut port_report = ValidationReport::new();
        let routed = self.route_edges(nodes, edges, &mut port_report);

        let graph = match DependencyGraph::build(nodes, &routed) {
            Ok(graph) => Some(graph),
            Err(problems) => {
                report.extend(problems);
                None
            }
        };

        for node in nodes {
            if !self.registry.contains(&node.node_type) {
                report.push(GraphValidationError::UnknownNodeType {
                    node_id: node.id.clone(),
                    node_type: node.node_type.clone(),
                });
            }
        }

        if let Some(cycle) = graph.as_ref().and_then(DependencyGraph::detect_cycle) {
            report.push(cycle);
        }
        report.extend(port_report);

        let variables = match VariableContext::from_variables(variables) {
            Ok(context) => Some(context),
            Err(problems) => {
                report.extend(problems);
                None
            }
        };

        match (graph, variables) {
            (Some(graph), Some(variables)) if report.is_empty() => {
                let order = graph.topological_order()?;
                Ok(ExecutionPlan {
                    graph,
                    order,
                    variables,
                })
            }
            _ => Err(report),
        }
    }

    /// Type check every edge and pin its handles to the ports it was checked
    /// against. The returned edges are what the run routes values by.
    fn route_edges(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        report: &mut ValidationReport,
    ) -> Vec<Edge> {
        let node_types: HashMap<&str, &str> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.node_type.as_str()))
            .collect();

        let mut routed = Vec::with_capacity(edges.len());
        for edge in edges {
            let source_meta = node_types
                .get(edge.source.as_str())
                .and_then(|t| self.registry.get_metadata(t));
            let target_meta = node_types
                .get(edge.target.as_str())
                .and_then(|t| self.registry.get_metadata(t));
            // Dangling endpoints and unknown types are reported elsewhere.
            let (Some(source_meta), Some(target_meta)) = (source_meta, target_meta) else {
                routed.push(edge.clone());
                continue;
            };

            let source_port = source_meta.output_port(edge.source_handle.as_deref());
            let target_port = target_meta.input_port(edge.target_handle.as_deref());

            let source_route = source_port.route(edge.source_handle.as_deref());
            let target_route = target_port.route(edge.target_handle.as_deref());
            if source_route.is_none() {
                report.push(GraphValidationError::UnknownPort {
                    edge_id: edge.id.clone(),
                    node_id: edge.source.clone(),
                    handle: edge.source_port().to_string(),
                });
            }
            if target_route.is_none() {
                report.push(GraphValidationError::UnknownPort {
                    edge_id: edge.id.clone(),
                    node_id: edge.target.clone(),
                    handle: edge.target_port().to_string(),
                });
            }

            if let (Some(source_type), Some(target_type)) =
                (source_port.value_type(), target_port.value_type())
            {
                if !self.ports.are_ports_compatible(source_type, target_type) {
                    report.push(GraphValidationError::IncompatiblePorts {
                        edge_id: edge.id.clone(),
                        source_type,
                        target_type,
                    });
                }
            }

            let mut edge = edge.clone();
            edge.source_handle = source_route.or(edge.source_handle.take());
            edge.target_handle = target_route.or(edge.target_handle.take());
            routed.push(edge);
        }
        routed
    }

    /// Execute a workflow and return its result
    pub async fn execute(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        variables: &[Variable],
    ) -> RunResult {
        self.execute_with_cancel(nodes, edges, variables, CancellationToken::new())
            .await
    }

    /// Execute a workflow that the caller may abort through `cancel`
    pub async fn execute_with_cancel(
        &self,
        nodes: &[Node],
        edges: &[Edge],
        variables: &[Variable],
        cancel: CancellationToken,
    ) -> RunResult {
        let execution_id = ExecutionId::new_v4();
        let started = Instant::now();

        self.event_bus.emit(ExecutionEvent::RunStarted {
            execution_id,
            node_count: nodes.len(),
            timestamp: Utc::now(),
        });

        let result = self
            .run(execution_id, nodes, edges, variables, &cancel, started)
            .await;

        self.event_bus.emit(ExecutionEvent::RunCompleted {
            execution_id,
            success: result.success,
            duration_ms: result.duration_ms,
            timestamp: Utc::now(),
        });

        result
    }

    #[instrument(
        name = "workflow_execute",
        skip_all,
        fields(execution_id = %execution_id, nodes = nodes.len(), edges = edges.len())
    )]
    async fn run(
        &self,
        execution_id: ExecutionId,
        nodes: &[Node],
        edges: &[Edge],
        variables: &[Variable],
        cancel: &CancellationToken,
        started: Instant,
    ) -> RunResult {
        info!("Starting workflow execution: {}", execution_id);

        let plan = match self.validate(nodes, edges, variables) {
            Ok(plan) => plan,
            Err(report) => {
                warn!(error = %report, "Workflow validation failed");
                return RunResult::failed(
                    execution_id,
                    RunErrorKind::Validation,
                    report.to_string(),
                    elapsed_ms(started),
                );
            }
        };
        debug!(order = ?plan.order, "Execution order computed");

        let run_token = cancel.child_token();
        let deadline = self.config.max_execution_time_ms.map(|ms| {
            let token = run_token.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(ms)).await;
                token.cancel();
            })
        });

        let outcome = self
            .execute_plan(execution_id, nodes, &plan, cancel, &run_token)
            .await;

        if let Some(timer) = deadline {
            timer.abort();
        }

        match outcome {
            Ok(state) => {
                let result = state.into_result(execution_id, nodes, &plan, elapsed_ms(started));
                if result.success {
                    info!("Workflow {} completed in {}ms", execution_id, result.duration_ms);
                } else {
                    warn!(
                        error = result.error.as_deref().unwrap_or_default(),
                        "Workflow {} finished unsuccessfully", execution_id
                    );
                }
                result
            }
            Err(fault) => {
                error!(error = %fault, "Workflow {} aborted by engine fault", execution_id);
                RunResult::failed(
                    execution_id,
                    RunErrorKind::Internal,
                    fault.to_string(),
                    elapsed_ms(started),
                )
            }
        }
    }

    /// Drive the ready set until every node is terminal.
    async fn execute_plan(
        &self,
        execution_id: ExecutionId,
        nodes: &[Node],
        plan: &ExecutionPlan,
        caller: &CancellationToken,
        run_token: &CancellationToken,
    ) -> Result<RunState, FlowError> {
        let node_by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let mut state = RunState::new(&plan.order);
        let mut running = FuturesUnordered::new();
        let max_parallel = self.config.parallelism();

        loop {
            if run_token.is_cancelled() && state.cancel_reason.is_none() {
                let reason = if caller.is_cancelled() {
                    "run cancelled by caller".to_string()
                } else {
                    format!(
                        "run exceeded its {}ms deadline",
                        self.config.max_execution_time_ms.unwrap_or_default()
                    )
                };
                warn!(reason = %reason, "Workflow {} cancelled", execution_id);
                state.cancel_reason = Some(reason);
            }

            let mut progressed = self.skip_blocked(execution_id, plan, &mut state)?;

            if state.cancel_reason.is_none() {
                for node_id in &plan.order {
                    if running.len() >= max_parallel {
                        break;
                    }
                    if !state.is_ready(node_id, &plan.graph) {
                        continue;
                    }
                    let node = node_by_id.get(node_id.as_str()).copied().ok_or_else(|| {
                        FlowError::Internal(format!("node '{}' missing from request", node_id))
                    })?;
                    let executor = self.registry.get(&node.node_type).cloned().ok_or_else(|| {
                        FlowError::Internal(format!("no executor for type '{}'", node.node_type))
                    })?;

                    progressed = true;
                    state.transition(node_id, NodeStatus::Running)?;

                    let input = match prepare_input(node, plan, &state) {
                        Ok(input) => input,
                        Err(unresolved) => {
                            let error = NodeError::from(unresolved);
                            error!("Node {} failed: {}", node_id, error);
                            self.emit_failed(execution_id, node_id, &error, 0);
                            state.fail(node_id, &error, 0, 0)?;
                            note_blocked(plan, node_id);
                            continue;
                        }
                    };
                    state.inputs.insert(node_id.clone(), input.clone());

                    self.event_bus.emit(ExecutionEvent::NodeStarted {
                        execution_id,
                        node_id: node_id.clone(),
                        node_type: node.node_type.clone(),
                        timestamp: Utc::now(),
                    });
                    debug!("Dispatching node {} ({})", node_id, node.node_type);

                    let task = NodeTask {
                        execution_id,
                        node_id: node_id.clone(),
                        node_type: node.node_type.clone(),
                        input,
                        executor,
                        policy: self.config.retry.clone(),
                        predicate: self.retry_predicate.clone(),
                        node_timeout: self.config.node_timeout_ms.map(Duration::from_millis),
                        events: self.event_bus.clone(),
                        cancel: run_token.clone(),
                    };
                    let id = node_id.clone();
                    let handle = tokio::spawn(run_node(task));
                    running.push(async move { (id, handle.await) });
                }
            }

            if running.is_empty() {
                if progressed {
                    continue;
                }
                break;
            }

            if let Some((node_id, joined)) = running.next().await {
                match joined {
                    Ok(outcome) => self.record(execution_id, &node_id, outcome, &mut state)?,
                    Err(join_error) => {
                        let error = NodeError::ExecutionFailed(format!(
                            "executor task aborted: {}",
                            join_error
                        ));
                        error!("Node {} failed: {}", node_id, error);
                        self.emit_failed(execution_id, &node_id, &error, 1);
                        state.fail(&node_id, &error, 1, 0)?;
                    }
                }
                if state.status(&node_id) == Some(NodeStatus::Failed) {
                    note_blocked(plan, &node_id);
                }
            }
        }

        if let Some((node_id, _)) = state
            .results
            .iter()
            .find(|(_, result)| !result.status.is_terminal())
        {
            return Err(FlowError::Internal(format!(
                "node '{}' never reached a terminal state",
                node_id
            )));
        }

        Ok(state)
    }

    /// Mark pending nodes that can no longer run as skipped. Returns whether
    /// anything changed.
    fn skip_blocked(
        &self,
        execution_id: ExecutionId,
        plan: &ExecutionPlan,
        state: &mut RunState,
    ) -> Result<bool, FlowError> {
        let mut changed = false;
        // Topological order lets a skip cascade through the whole cone in
        // one pass.
        for node_id in &plan.order {
            if state.status(node_id) != Some(NodeStatus::Pending) {
                continue;
            }
            let reason = match &state.cancel_reason {
                Some(reason) => Some(SkipReason::Cancelled {
                    reason: reason.clone(),
                }),
                None => plan
                    .graph
                    .dependencies_of(node_id)
                    .into_iter()
                    .find(|dep| {
                        state
                            .status(dep)
                            .is_some_and(NodeStatus::blocks_dependents)
                    })
                    .map(|dep| SkipReason::UpstreamFailed {
                        node_id: dep.to_string(),
                    }),
            };
            if let Some(reason) = reason {
                let message = reason.message();
                info!("Node {} {}", node_id, message);
                self.event_bus.emit(ExecutionEvent::NodeSkipped {
                    execution_id,
                    node_id: node_id.clone(),
                    reason: message,
                    timestamp: Utc::now(),
                });
                state.skip(node_id, reason)?;
                changed = true;
            }
        }
        Ok(changed)
    }

    fn record(
        &self,
        execution_id: ExecutionId,
        node_id: &str,
        outcome: NodeOutcome,
        state: &mut RunState,
    ) -> Result<(), FlowError> {
        match outcome.result {
            Ok(output) => {
                info!(
                    attempts = outcome.attempts,
                    "Node {} completed in {}ms", node_id, outcome.duration_ms
                );
                self.event_bus.emit(ExecutionEvent::NodeCompleted {
                    execution_id,
                    node_id: node_id.to_string(),
                    outputs: output.outputs.clone(),
                    duration_ms: outcome.duration_ms,
                    timestamp: Utc::now(),
                });
                state.succeed(node_id, output, outcome.attempts, outcome.duration_ms)
            }
            Err(error) => {
                error!(attempts = outcome.attempts, "Node {} failed: {}", node_id, error);
                self.emit_failed(execution_id, node_id, &error, outcome.attempts);
                state.fail(node_id, &error, outcome.attempts, outcome.duration_ms)
            }
        }
    }

    fn emit_failed(
        &self,
        execution_id: ExecutionId,
        node_id: &str,
        error: &NodeError,
        attempts: u32,
    ) {
        self.event_bus.emit(ExecutionEvent::NodeFailed {
            execution_id,
            node_id: node_id.to_string(),
            error: error.to_string(),
            attempts,
            timestamp: Utc::now(),
        });
    }
}

/// Log the downstream cone a failed node takes down with it.
fn note_blocked(plan: &ExecutionPlan, node_id: &str) {
    let blocked = plan.graph.descendants_of(node_id);
    if !blocked.is_empty() {
        info!(
            blocked = ?blocked,
            "Failure of node {} blocks {} downstream node(s)",
            node_id,
            blocked.len()
        );
    }
}

/// Merge values arriving over edges into the node's data, then resolve
/// placeholders against the variables and the direct upstream outputs.
fn prepare_input(
    node: &Node,
    plan: &ExecutionPlan,
    state: &RunState,
) -> Result<Map<String, Value>, ResolutionError> {
    let mut scope = ResolutionScope::new(&plan.variables);
    for dep in plan.graph.dependencies_of(&node.id) {
        if let Some(output) = state.outputs.get(dep) {
            for (port, value) in &output.outputs {
                scope.with_output(dep, port, value.clone());
            }
        }
    }

    let mut arriving: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
    for edge in plan.graph.incoming_edges(&node.id) {
        match state
            .outputs
            .get(&edge.source)
            .and_then(|output| output.get(edge.source_port()))
        {
            Some(value) => arriving
                .entry(edge.target_port())
                .or_default()
                .push(value.clone()),
            None => debug!(
                edge_id = %edge.id,
                "Node {} produced nothing on port '{}'", edge.source, edge.source_port()
            ),
        }
    }

    let mut input = node.data.clone();
    for (port, mut values) in arriving {
        let value = if values.len() == 1 {
            values.remove(0)
        } else {
            Value::Array(values)
        };
        input.insert(port.to_string(), value);
    }

    resolve_map(&input, &scope)
}

/// Engine-owned bookkeeping for one run. Node tasks never touch it; they
/// hand their outcome back to the loop.
struct RunState {
    results: BTreeMap<String, NodeResult>,
    outputs: HashMap<String, NodeOutput>,
    inputs: HashMap<String, Map<String, Value>>,
    cancel_reason: Option<String>,
}

impl RunState {
    fn new(order: &[String]) -> Self {
        Self {
            results: order
                .iter()
                .map(|id| (id.clone(), NodeResult::pending()))
                .collect(),
            outputs: HashMap::new(),
            inputs: HashMap::new(),
            cancel_reason: None,
        }
    }

    fn status(&self, node_id: &str) -> Option<NodeStatus> {
        self.results.get(node_id).map(|r| r.status)
    }

    fn is_ready(&self, node_id: &str, graph: &DependencyGraph) -> bool {
        self.status(node_id) == Some(NodeStatus::Pending)
            && graph
                .dependencies_of(node_id)
                .into_iter()
                .all(|dep| self.status(dep) == Some(NodeStatus::Succeeded))
    }

    fn transition(
        &mut self,
        node_id: &str,
        next: NodeStatus,
    ) -> Result<&mut NodeResult, FlowError> {
        let slot = self.results.get_mut(node_id).ok_or_else(|| {
            FlowError::Internal(format!("no result slot for node '{}'", node_id))
        })?;
        if !slot.status.can_transition_to(next) {
            return Err(FlowError::Internal(format!(
                "illegal transition for node '{}': {:?} -> {:?}",
                node_id, slot.status, next
            )));
        }
        slot.status = next;
        Ok(slot)
    }

    fn succeed(
        &mut self,
        node_id: &str,
        output: NodeOutput,
        attempts: u32,
        duration_ms: u64,
    ) -> Result<(), FlowError> {
        let slot = self.transition(node_id, NodeStatus::Succeeded)?;
        slot.output = Some(output.to_value());
        slot.attempts = attempts;
        slot.duration_ms = duration_ms;
        self.outputs.insert(node_id.to_string(), output);
        Ok(())
    }

    fn fail(
        &mut self,
        node_id: &str,
        error: &NodeError,
        attempts: u32,
        duration_ms: u64,
    ) -> Result<(), FlowError> {
        let slot = self.transition(node_id, NodeStatus::Failed)?;
        slot.error = Some(error.to_string());
        slot.attempts = attempts;
        slot.duration_ms = duration_ms;
        Ok(())
    }

    fn skip(&mut self, node_id: &str, reason: SkipReason) -> Result<(), FlowError> {
        let slot = self.transition(node_id, NodeStatus::Skipped)?;
        slot.error = Some(reason.message());
        slot.skip_reason = Some(reason);
        Ok(())
    }

    fn into_result(
        self,
        execution_id: ExecutionId,
        nodes: &[Node],
        plan: &ExecutionPlan,
        duration_ms: u64,
    ) -> RunResult {
        let failed: Vec<&str> = self
            .results
            .iter()
            .filter(|(_, r)| r.status == NodeStatus::Failed)
            .map(|(id, _)| id.as_str())
            .collect();

        let (error, error_kind) = match (&self.cancel_reason, failed.is_empty()) {
            (Some(reason), _) => (Some(reason.clone()), Some(RunErrorKind::Cancelled)),
            (None, false) => (
                Some(format!("{} node(s) failed: {}", failed.len(), failed.join(", "))),
                Some(RunErrorKind::Execution),
            ),
            (None, true) => (None, None),
        };

        let by_id: HashMap<&str, &Node> = nodes.iter().map(|n| (n.id.as_str(), n)).collect();
        let updated: Vec<Node> = plan
            .order
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|node| {
                let mut node = (*node).clone();
                if let Some(input) = self.inputs.get(&node.id) {
                    node.data = input.clone();
                }
                if let Some(output) = self.results.get(&node.id).and_then(|r| r.output.clone()) {
                    node.data.insert("output".to_string(), output);
                }
                node
            })
            .collect();

        RunResult {
            success: error_kind.is_none(),
            execution_id,
            order: Some(plan.order.clone()),
            nodes: Some(updated),
            results: Some(self.results),
            error,
            error_kind,
            duration_ms,
        }
    }
}

/// Everything a spawned node task owns.
struct NodeTask {
    execution_id: ExecutionId,
    node_id: String,
    node_type: String,
    input: Map<String, Value>,
    executor: Arc<dyn NodeExecutor>,
    policy: RetryPolicy,
    predicate: RetryPredicate,
    node_timeout: Option<Duration>,
    events: Arc<EventBus>,
    cancel: CancellationToken,
}

struct NodeOutcome {
    result: Result<NodeOutput, NodeError>,
    attempts: u32,
    duration_ms: u64,
}

/// Run one node to completion, retrying per policy. Suspends only on the
/// executor, its timeout and backoff sleeps; each is cut short by
/// cancellation.
async fn run_node(task: NodeTask) -> NodeOutcome {
    let started = Instant::now();
    let mut retry = RetryState::new(&task.policy);

    loop {
        let attempt = retry.begin_attempt();
        let ctx = NodeContext {
            node_id: task.node_id.clone(),
            node_type: task.node_type.clone(),
            input: task.input.clone(),
            attempt,
            events: task.events.create_emitter(task.execution_id, &task.node_id),
            cancellation: task.cancel.clone(),
        };

        let result = tokio::select! {
            biased;
            _ = task.cancel.cancelled() => Err(NodeError::Cancelled),
            result = attempt_once(task.executor.as_ref(), ctx, task.node_timeout) => result,
        };

        let error = match result {
            Ok(output) => {
                return NodeOutcome {
                    result: Ok(output),
                    attempts: attempt,
                    duration_ms: elapsed_ms(started),
                }
            }
            Err(error) => error,
        };

        match retry.on_failure(task.predicate.is_retryable(&error)) {
            RetryDecision::Retry {
                attempt: next,
                delay,
            } => {
                warn!(
                    node_id = %task.node_id,
                    "Node attempt {}/{} failed: {}. Retrying in {}ms",
                    attempt,
                    task.policy.max_attempts.max(1),
                    error,
                    delay.as_millis()
                );
                task.events.emit(ExecutionEvent::NodeRetrying {
                    execution_id: task.execution_id,
                    node_id: task.node_id.clone(),
                    attempt: next,
                    delay_ms: delay.as_millis() as u64,
                    error: error.to_string(),
                    timestamp: Utc::now(),
                });
                tokio::select! {
                    biased;
                    _ = task.cancel.cancelled() => {
                        return NodeOutcome {
                            result: Err(NodeError::Cancelled),
                            attempts: attempt,
                            duration_ms: elapsed_ms(started),
                        };
                    }
                    _ = sleep(delay) => {}
                }
            }
            RetryDecision::Exhausted | RetryDecision::Terminal => {
                return NodeOutcome {
                    result: Err(error),
                    attempts: attempt,
                    duration_ms: elapsed_ms(started),
                };
            }
        }
    }
}

async fn attempt_once(
    executor: &dyn NodeExecutor,
    ctx: NodeContext,
    limit: Option<Duration>,
) -> Result<NodeOutput, NodeError> {
    match limit {
        Some(limit) => match timeout(limit, executor.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => Err(NodeError::Timeout {
                ms: limit.as_millis() as u64,
            }),
        },
        None => executor.execute(ctx).await,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

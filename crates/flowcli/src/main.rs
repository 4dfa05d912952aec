// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{
    ExecutionEvent, Node, NodeEvent, NodeStatus, Value, ValueType, Variable, WorkflowRequest,
};
use flowruntime::{is_referenceable, referenced_names, EngineConfig, ExecutionEngine};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Variable values as a JSON object, overriding the file's variables
        #[arg(long)]
        variables: Option<String>,

        /// Engine configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum nodes running at once
        #[arg(long)]
        max_parallel: Option<usize>,

        /// Attempts per node, including the first
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Per-attempt timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },
}

/// Config file (if any) with command-line overrides applied on top.
struct ConfigOverrides {
    config: Option<PathBuf>,
    max_parallel: Option<usize>,
    max_attempts: Option<u32>,
    timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    fn resolve(self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        if let Some(n) = self.max_parallel {
            config.max_parallel_nodes = n;
        }
        if let Some(n) = self.max_attempts {
            config.retry.max_attempts = n;
        }
        if let Some(ms) = self.timeout_ms {
            config.node_timeout_ms = Some(ms);
        }
        Ok(config)
    }
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            variables,
            config,
            max_parallel,
            max_attempts,
            timeout_ms,
            verbose,
        } => {
            init_logging(if verbose { "debug" } else { "info" });
            let config = ConfigOverrides {
                config,
                max_parallel,
                max_attempts,
                timeout_ms,
            }
            .resolve()?;
            debug!(?config, "Engine configuration");
            run_workflow(file, variables, config).await?;
        }

        Commands::Validate { file } => {
            init_logging("warn");
            validate_workflow(file)?;
        }

        Commands::Nodes => {
            init_logging("warn");
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(output)?;
        }
    }

    Ok(())
}

fn load_request(file: &Path) -> Result<WorkflowRequest> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading workflow {}", file.display()))?;
    let request: WorkflowRequest = serde_json::from_str(&raw)
        .with_context(|| format!("parsing workflow {}", file.display()))?;
    request.validate_shape()?;
    Ok(request)
}

/// Variable type implied by a bare JSON value from the command line.
fn infer_type(value: &Value) -> ValueType {
    match value {
        Value::Number(_) => ValueType::Number,
        Value::Bool(_) => ValueType::Boolean,
        _ => ValueType::Text,
    }
}

/// Override existing variables by name; unknown names are added with an
/// inferred type.
fn apply_variable_overrides(request: &mut WorkflowRequest, raw: &str) -> Result<()> {
    let json: Value = serde_json::from_str(raw).context("parsing --variables")?;
    let Value::Object(overrides) = json else {
        bail!("--variables must be a JSON object");
    };

    for (name, value) in overrides {
        match request.variables.iter_mut().find(|v| v.name == name) {
            Some(existing) => existing.value = value,
            None => {
                let var_type = infer_type(&value);
                request.add_variable(Variable::new(name, var_type, value));
            }
        }
    }
    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::RunStarted { node_count, .. } => {
            println!("▶️  Workflow started ({} nodes)", node_count);
        }
        ExecutionEvent::NodeStarted {
            node_id, node_type, ..
        } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeRetrying {
            node_id,
            attempt,
            delay_ms,
            error,
            ..
        } => {
            println!(
                "  🔁 Node {} retrying (attempt {}) in {}ms: {}",
                node_id, attempt, delay_ms, error
            );
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            duration_ms,
            ..
        } => {
            println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
        }
        ExecutionEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        ExecutionEvent::NodeSkipped { node_id, reason, .. } => {
            println!("  ⏭️  Node {} {}", node_id, reason);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => {
                println!("     ℹ️  [{}] {}", node_id, message);
            }
            NodeEvent::Warning { message } => {
                println!("     ⚠️  [{}] {}", node_id, message);
            }
            NodeEvent::Progress { percent, message } => {
                if let Some(msg) = message {
                    println!("     📊 [{}] {}% - {}", node_id, percent, msg);
                } else {
                    println!("     📊 [{}] {}%", node_id, percent);
                }
            }
        },
        ExecutionEvent::RunCompleted {
            success,
            duration_ms,
            ..
        } => {
            if success {
                println!("✨ Workflow completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Workflow failed after {}ms", duration_ms);
            }
        }
    }
}

async fn run_workflow(
    file: PathBuf,
    variables: Option<String>,
    config: EngineConfig,
) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let mut request = load_request(&file)?;
    if let Some(raw) = variables {
        apply_variable_overrides(&mut request, &raw)?;
    }

    println!("   Nodes: {}", request.nodes.len());
    println!("   Edges: {}", request.edges.len());
    println!("   Variables: {}", request.variables.len());
    println!();

    let engine = ExecutionEngine::with_config(Arc::new(flownodes::standard_registry()), config);

    // Subscribe to events for real-time output
    let mut events = engine.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, ExecutionEvent::RunCompleted { .. });
            print_event(event);
            if done {
                break;
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n🛑 Interrupted, cancelling run...");
            on_interrupt.cancel();
        }
    });

    let result = engine
        .execute_with_cancel(&request.nodes, &request.edges, &request.variables, cancel)
        .await;

    // Let the listener drain through RunCompleted
    let _ = event_task.await;

    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", result.execution_id);

    if let Some(results) = &result.results {
        let succeeded = results
            .values()
            .filter(|r| r.status == NodeStatus::Succeeded)
            .count();
        println!("   Succeeded: {}/{} nodes", succeeded, results.len());

        println!();
        println!("📤 Outputs:");
        for (node_id, node) in results {
            match (&node.output, &node.error) {
                (Some(output), _) => println!("   {}: {}", node_id, output),
                (None, Some(error)) => println!("   {} [{:?}]: {}", node_id, node.status, error),
                (None, None) => {}
            }
        }
    }

    if !result.success {
        bail!(result
            .error
            .unwrap_or_else(|| "workflow failed".to_string()));
    }

    Ok(())
}

/// Names referenced by placeholders that are neither variables nor
/// `<node>.<port>` references to an existing node.
fn undefined_references(request: &WorkflowRequest) -> BTreeSet<String> {
    let declared: BTreeSet<&str> = request.variables.iter().map(|v| v.name.as_str()).collect();
    let node_ids: BTreeSet<&str> = request.nodes.iter().map(|n| n.id.as_str()).collect();

    request
        .nodes
        .iter()
        .flat_map(|node| referenced_names(&Value::Object(node.data.clone())))
        .filter(|name| !declared.contains(name.as_str()))
        .filter(|name| match name.split_once('.') {
            Some((node, _)) => !node_ids.contains(node),
            None => true,
        })
        .collect()
}

fn validate_workflow(file: PathBuf) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let request = load_request(&file)?;
    let engine = ExecutionEngine::new(flownodes::standard_registry());

    match engine.validate(&request.nodes, &request.edges, &request.variables) {
        Ok(plan) => {
            println!("✅ Workflow is valid:");
            println!("   Nodes: {}", request.nodes.len());
            println!("   Edges: {}", request.edges.len());
            println!("   Order: {}", plan.order.join(" → "));
        }
        Err(report) => {
            println!("❌ Workflow is invalid:");
            for error in &report.errors {
                println!("   - {}", error);
            }
            bail!("{} validation error(s)", report.errors.len());
        }
    }

    let hidden: Vec<&str> = request
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !is_referenceable(id))
        .collect();
    if !hidden.is_empty() {
        println!();
        println!("⚠️  Node ids that placeholders cannot reference:");
        for id in hidden {
            println!("   - {}", id);
        }
    }

    let undefined = undefined_references(&request);
    if !undefined.is_empty() {
        println!();
        println!("⚠️  Placeholders with no matching variable (these nodes will fail):");
        for name in undefined {
            println!("   - {{{{{}}}}}", name);
        }
    }

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    let registry = flownodes::standard_registry();

    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
            for port in &metadata.outputs {
                let ty = port.value_type.map(|t| t.to_string()).unwrap_or_else(|| "any".into());
                println!("    → {}: {}", port.name, ty);
            }
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn example_workflow() -> WorkflowRequest {
    let mut request = WorkflowRequest::new();

    let subject = request.add_node(
        Node::new("subject", "input.text")
            .with_data("value", "{{subject}}")
            .with_position(100.0, 100.0),
    );
    let prompt = request.add_node(
        Node::new("prompt", "text.template")
            .with_data("template", "A {{style}} painting of {{subject.default}}")
            .with_position(300.0, 100.0),
    );
    let log = request.add_node(
        Node::new("log", "debug.log")
            .with_data("message", "{{prompt.default}}")
            .with_position(500.0, 100.0),
    );

    request.connect(&subject, None, &prompt, None);
    request.connect(&prompt, None, &log, None);

    request.add_variable(Variable::new("subject", ValueType::Text, "a lighthouse at dawn"));
    request.add_variable(Variable::new("style", ValueType::Text, "watercolor"));
    request
}

fn create_example_workflow(output: PathBuf) -> Result<()> {
    let json = serde_json::to_string_pretty(&example_workflow())?;
    std::fs::write(&output, json)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --variables '{{\"subject\": \"a fox in the snow\"}}'",
        output.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overrides_replace_and_extend_variables() {
        let mut request = example_workflow();
        apply_variable_overrides(&mut request, r#"{"style": "ink", "seed": 42}"#).unwrap();

        let style = request.variables.iter().find(|v| v.name == "style").unwrap();
        assert_eq!(style.value, json!("ink"));
        let seed = request.variables.iter().find(|v| v.name == "seed").unwrap();
        assert_eq!(seed.var_type, ValueType::Number);
    }

    #[test]
    fn overrides_must_be_an_object() {
        let mut request = WorkflowRequest::new();
        assert!(apply_variable_overrides(&mut request, "[1, 2]").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let config = ConfigOverrides {
            config: None,
            max_parallel: Some(2),
            max_attempts: Some(1),
            timeout_ms: Some(500),
        }
        .resolve()
        .unwrap();
        assert_eq!(config.max_parallel_nodes, 2);
        assert_eq!(config.retry.max_attempts, 1);
        assert_eq!(config.node_timeout_ms, Some(500));
        assert_eq!(config.retry.base_delay_ms, 100);
    }

    #[test]
    fn example_workflow_is_valid_and_complete() {
        let request = example_workflow();
        request.validate_shape().unwrap();
        let engine = ExecutionEngine::new(flownodes::standard_registry());
        let plan = engine
            .validate(&request.nodes, &request.edges, &request.variables)
            .unwrap();
        assert_eq!(plan.order, vec!["subject", "prompt", "log"]);
        assert!(undefined_references(&request).is_empty());
    }

    #[test]
    fn reports_placeholders_without_a_source() {
        let mut request = example_workflow();
        request.variables.retain(|v| v.name != "style");
        request.nodes[0]
            .data
            .insert("note".into(), json!("{{ghost.default}}"));
        let undefined: Vec<String> = undefined_references(&request).into_iter().collect();
        assert_eq!(undefined, vec!["ghost.default", "style"]);
    }
}

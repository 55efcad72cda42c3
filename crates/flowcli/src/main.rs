// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{MemoryStore, NodeSpec, RunStatus, RunStore, Value, Workflow};
use flowqueue::{MemoryQueue, TaskQueue};
use flowruntime::{ExecutionPlan, ExecutorRegistry, FlowRuntime, PLUGIN_PREFIX};
use flowworker::{WorkerConfig, WorkerPool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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
    /// Execute a workflow file through the task queue and worker pool
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input data as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,

        #[command(flatten)]
        worker: WorkerConfig,
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

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            verbose,
            worker,
        } => {
            let level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
                )
                .init();

            run_workflow(&file, input, worker).await?;
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Nodes => {
            list_nodes();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }
    }

    Ok(())
}

fn load_workflow(file: &Path) -> Result<Workflow> {
    let workflow_json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let workflow: Workflow = serde_json::from_str(&workflow_json)
        .with_context(|| format!("Failed to parse {}", file.display()))?;
    Ok(workflow)
}

fn builtin_registry() -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    flownodes::register_all(&mut registry);
    registry
}

async fn run_workflow(file: &Path, input: Option<String>, config: WorkerConfig) -> Result<()> {
    println!("🚀 Loading workflow from: {}", file.display());

    let workflow = load_workflow(file)?;
    let workflow_id = workflow.id;

    println!("📋 Workflow: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());
    println!();

    let input = input.unwrap_or_default();
    Value::parse_document(&input).context("Input must be a JSON object")?;

    let store = Arc::new(MemoryStore::new());
    for entry in flownodes::node_types() {
        store.register_node_type(entry).await?;
    }
    let runtime = FlowRuntime::new(store, Arc::new(builtin_registry()));
    runtime.register_workflow(workflow).await?;

    let queue = TaskQueue::new(Arc::new(MemoryQueue::new()));
    let queue_name = config.queue.clone();
    let pool = WorkerPool::spawn(config, queue.clone(), runtime.engine().clone());

    let run = runtime.create_run(workflow_id, input).await?;
    queue.enqueue_run(&queue_name, run.id).await?;
    println!("▶️  Run {} queued on {}", run.id, queue_name);

    let report = loop {
        let report = runtime.status(run.id).await?;
        if report.run.status.is_terminal() {
            break Some(report);
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!(run_id = run.id, "Interrupted, shutting down");
                break None;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    };

    pool.shutdown().await;

    // Interrupted runs are cancelled by the pool; show their final state
    let report = match report {
        Some(report) => report,
        None => runtime.status(run.id).await?,
    };

    println!();
    println!("📊 Execution Summary:");
    println!("   Run ID: {}", report.run.id);
    println!("   Status: {}", report.run.status);
    for step in &report.steps {
        let marker = match step.status {
            flowcore::StepStatus::Completed => "✅",
            flowcore::StepStatus::Failed => "❌",
            _ => "⏳",
        };
        println!("  {} Node {} {}", marker, step.node_id, step.status);
        if let Some(error) = &step.error {
            println!("     {}", error);
        }
    }

    if let Some(output) = &report.run.output {
        println!();
        println!("📤 Outputs:");
        println!("{}", serde_json::to_string_pretty(output)?);
    }

    match report.run.status {
        RunStatus::Completed => Ok(()),
        _ => bail!(
            "Run failed: {}",
            report.run.error.as_deref().unwrap_or("interrupted")
        ),
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = load_workflow(file)?;
    ExecutionPlan::build(&workflow)?;

    let registry = builtin_registry();
    let known = registry.list_executor_types();
    for node in &workflow.nodes {
        if !node.node_type.starts_with(PLUGIN_PREFIX) && !known.contains(&node.node_type) {
            bail!("Node {} has unknown type {}", node.id, node.node_type);
        }
        Value::parse_document(&node.config)
            .with_context(|| format!("Node {} has malformed config", node.id))?;
    }

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name);
    println!("   Nodes: {}", workflow.nodes.len());
    println!("   Connections: {}", workflow.connections.len());

    Ok(())
}

fn list_nodes() {
    println!("📦 Available Node Types:");
    println!();

    for entry in flownodes::node_types() {
        println!("  • {} - {} ({})", entry.key, entry.name, entry.category);
        println!("    {}", entry.description);
    }
    println!();
    println!("  Extensions: {}<path to executable>", PLUGIN_PREFIX);
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut workflow = Workflow::new(1, "User lookup");
    workflow.description = Some("Fetches a user and keeps the contact fields".to_string());

    let fetch = workflow.add_node(
        NodeSpec::new(1, "httpRequest")
            .with_name("Fetch user")
            .with_config(serde_json::json!({
                "url": "https://jsonplaceholder.typicode.com/users/{{user_id}}",
                "method": "GET"
            }))
            .with_position(100.0, 100.0),
    );
    let transform = workflow.add_node(
        NodeSpec::new(2, "transform")
            .with_name("Contact card")
            .with_config(serde_json::json!({
                "mapping": {
                    "status": "{{status_code}}",
                    "name": "{{data.name}}",
                    "email": "{{data.email}}"
                }
            }))
            .with_position(300.0, 100.0),
    );
    workflow.connect(fetch, transform);

    let json = serde_json::to_string_pretty(&workflow)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --file {} --input '{{\"user_id\": 1}}'",
        output.display()
    );

    Ok(())
}

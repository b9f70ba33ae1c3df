use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use weft_core::config::AppConfig;
use weft_core::graph::WorkflowGraph;
use weft_engine::{ExecutionCoordinator, SimulatedAgentInvoker};
use weft_gateway::GatewayServer;
use weft_store::SqliteStore;

#[derive(Parser)]
#[command(name = "weft", version, about = "Workflow execution engine for agent automations")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weft.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP control API
    Serve,
    /// Execute a workflow from a JSON file and follow it to completion
    Run {
        /// Path to the workflow definition
        file: PathBuf,
        /// Initial variables as JSON, e.g. '{"env": "prod"}'
        #[arg(long)]
        variables: Option<String>,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("weft=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = if cli.config.exists() {
        AppConfig::load(&cli.config)?
    } else {
        info!(path = %cli.config.display(), "No config file found, using defaults");
        AppConfig::default()
    };

    let store = Arc::new(SqliteStore::open(std::path::Path::new(&config.store.path))?);
    let shutdown = CancellationToken::new();
    let coordinator = Arc::new(ExecutionCoordinator::new(
        store.clone(),
        Arc::new(SimulatedAgentInvoker::default()),
        store,
        config.engine.clone(),
        shutdown.clone(),
    ));

    // Graceful shutdown on Ctrl-C
    let cancel = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
        cancel.cancel();
    });

    match cli.command {
        Commands::Serve => {
            let gateway_config = config.gateway.clone().unwrap_or_default();
            let server = GatewayServer::new(gateway_config, coordinator);
            server.run(shutdown).await?;
        }
        Commands::Run { file, variables } => {
            let content = std::fs::read_to_string(&file)?;
            let graph: WorkflowGraph = serde_json::from_str(&content)?;

            let variables: HashMap<String, serde_json::Value> = match variables {
                Some(raw) => serde_json::from_str(&raw)?,
                None => HashMap::new(),
            };

            run_and_follow(&coordinator, graph, variables, &shutdown).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Execute one workflow as the local owner and print progress until it
/// reaches a terminal state.
async fn run_and_follow(
    coordinator: &ExecutionCoordinator,
    graph: WorkflowGraph,
    variables: HashMap<String, serde_json::Value>,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    let id = coordinator.execute(graph, "local", variables).await?;
    println!("Execution {} started", id);

    let mut last_progress = u8::MAX;
    loop {
        if shutdown.is_cancelled() {
            coordinator.stop(&id, "local").await.ok();
        }

        let record = coordinator.status(&id, "local").await?;
        if record.progress != last_progress {
            let node = record.current_node.as_deref().unwrap_or("-");
            println!("  {:>3}%  {}  [{}]", record.progress, record.status, node);
            last_progress = record.progress;
        }

        if record.status.is_terminal() {
            println!(
                "Execution {} {} ({}/{} nodes, {} errors)",
                id,
                record.status,
                record.metrics.completed_nodes,
                record.metrics.total_nodes,
                record.metrics.error_count,
            );
            if let Some(details) = record.error_details {
                eprintln!("Error: {}", details);
            }
            break;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skein_core::config::EngineConfig;
use skein_core::goal::Goal;
use skein_core::graph::GraphSpec;
use skein_core::traits::SessionStore;
use skein_core::types::{ExecutionResult, SessionId};
use skein_engine::{validate, GraphExecutor, MockStepExecutor};
use skein_store::SqliteSessionStore;

#[derive(Parser)]
#[command(name = "skein", version, about = "Goal-driven graph executor for agent workflows")]
struct Cli {
    /// Directory for the session database
    #[arg(long, default_value = ".skein", env = "SKEIN_DATA_DIR")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a graph definition and print errors and warnings
    Validate {
        /// Path to the graph JSON file
        graph: PathBuf,
    },
    /// Run a graph with the mock step executor
    Run {
        /// Path to the graph JSON file
        graph: PathBuf,
        /// Path to an optional goal JSON file
        #[arg(long)]
        goal: Option<PathBuf>,
        /// Initial context entries, key=value (value parsed as JSON, else string)
        #[arg(short, long)]
        input: Vec<String>,
        /// Session id (auto-generated if not provided)
        #[arg(short, long)]
        session: Option<String>,
        /// Override the step budget
        #[arg(long)]
        step_budget: Option<u32>,
        /// Start from an alternate entry point
        #[arg(long)]
        entry: Option<String>,
    },
    /// Resume a previously paused run
    Resume {
        /// Path to the graph JSON file the session was created with
        graph: PathBuf,
        /// Session id returned by the paused run
        session: String,
        /// Supplemental context entries, key=value
        #[arg(short, long)]
        input: Vec<String>,
        /// Path to an optional goal JSON file
        #[arg(long)]
        goal: Option<PathBuf>,
    },
    /// List persisted sessions
    Sessions,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { graph } => {
            let graph = load_graph(&graph)?;
            let report = validate(&graph);
            for warning in &report.warnings {
                println!("warning: {}", warning);
            }
            if report.valid {
                println!("graph '{}' is valid ({} nodes, {} edges)", graph.id, graph.nodes.len(), graph.edges.len());
            } else {
                for error in &report.errors {
                    println!("error: {}", error);
                }
                bail!("graph '{}' failed validation", graph.id);
            }
        }
        Commands::Run {
            graph,
            goal,
            input,
            session,
            step_budget,
            entry,
        } => {
            let graph = load_graph(&graph)?;
            let goal = goal.map(|p| load_goal(&p)).transpose()?;
            let mut config = EngineConfig::default();
            if let Some(budget) = step_budget {
                config.step_budget = budget;
            }

            let store = open_store(&cli.data_dir)?;
            let executor = GraphExecutor::new(graph, goal, config, Arc::new(MockStepExecutor::new()), store)?;

            let session_id = session
                .map(|s| SessionId::from_str(&s))
                .unwrap_or_default();
            info!(session_id = %session_id, "Starting run");

            let initial = parse_inputs(&input)?;
            let result = match entry {
                Some(entry) => executor.run_from(session_id.clone(), &entry, initial).await?,
                None => executor.run(session_id.clone(), initial).await?,
            };
            print_result(&session_id, &result);
        }
        Commands::Resume {
            graph,
            session,
            input,
            goal,
        } => {
            let graph = load_graph(&graph)?;
            let goal = goal.map(|p| load_goal(&p)).transpose()?;
            let store = open_store(&cli.data_dir)?;
            let executor = GraphExecutor::new(
                graph,
                goal,
                EngineConfig::default(),
                Arc::new(MockStepExecutor::new()),
                store,
            )?;

            let session_id = SessionId::from_str(&session);
            let result = executor.resume(&session_id, parse_inputs(&input)?).await?;
            print_result(&session_id, &result);
        }
        Commands::Sessions => {
            let store = open_store(&cli.data_dir)?;
            let sessions = store.list()?;
            if sessions.is_empty() {
                println!("no persisted sessions");
            }
            for session in sessions {
                println!("{}", session);
            }
        }
    }

    Ok(())
}

fn load_graph(path: &Path) -> anyhow::Result<GraphSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read graph file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse graph {}", path.display()))
}

fn load_goal(path: &Path) -> anyhow::Result<Goal> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read goal file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse goal {}", path.display()))
}

fn open_store(data_dir: &Path) -> anyhow::Result<Arc<SqliteSessionStore>> {
    Ok(Arc::new(SqliteSessionStore::open(&data_dir.join("sessions.db"))?))
}

/// Parse `key=value` pairs; values that parse as JSON stay JSON, the rest
/// become strings.
fn parse_inputs(pairs: &[String]) -> anyhow::Result<HashMap<String, serde_json::Value>> {
    let mut inputs = HashMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("input '{}' is not key=value", pair);
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        inputs.insert(key.to_string(), value);
    }
    Ok(inputs)
}

fn print_result(session_id: &SessionId, result: &ExecutionResult) {
    if let Some(paused_at) = &result.paused_at {
        println!("paused at node '{}' after {} steps", paused_at, result.steps_executed);
        println!("resume with: skein resume <graph.json> {}", session_id);
        return;
    }
    if result.success {
        println!("succeeded in {} steps", result.steps_executed);
        match serde_json::to_string_pretty(&result.output) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{:?}", result.output),
        }
    } else {
        println!(
            "failed after {} steps: {}",
            result.steps_executed,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
}

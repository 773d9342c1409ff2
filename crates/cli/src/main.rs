//! `pipeline-studio` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`    — start the in-memory development backend.
//! - `validate` — check a saved workflow document offline.
//! - `inspect`  — fetch a workflow and print its graph.
//! - `watch`    — poll a target's run history until Ctrl-C.
//! - `run`      — request a run of a task or workflow.
//! - `status`   — enable or disable a workflow.
//! - `delete`   — delete a workflow.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use backend::models::{RunLogEntry, RunTarget, WireNode};
use backend::{BackendConfig, HttpBackend, MemoryBackend, WorkflowStore};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine::{CatalogConfig, DagModel, Editor};
use monitor::{LogPoller, PollerConfig, RunTrigger, TriggerConfig, TriggerOutcome};
use serde::Deserialize;
use surface::{EditMode, GraphSurface, MemorySurface};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "pipeline-studio",
    about = "Visual data-pipeline workflow tooling",
    version
)]
struct Cli {
    /// Base URL of the workflow backend.
    #[arg(
        long,
        global = true,
        env = "WORKFLOW_BACKEND_URL",
        default_value = "http://localhost:8080/api/v1"
    )]
    backend_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the in-memory development backend.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        bind: String,
        /// Preload a demo catalog and run history.
        #[arg(long)]
        seed: bool,
    },
    /// Validate a saved workflow document (JSON with `nodes` and `canvas`).
    Validate {
        path: PathBuf,
    },
    /// Fetch a workflow and print its nodes in execution order.
    Inspect {
        id: Uuid,
    },
    /// Poll run history of a target until interrupted.
    Watch(TargetArgs),
    /// Request a run.
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// Keep polling the target's run history afterwards.
        #[arg(long)]
        watch: bool,
    },
    /// Enable or disable a workflow's schedule.
    Status {
        id: Uuid,
        #[arg(long, conflicts_with = "disable", required_unless_present = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
    /// Delete a workflow.
    Delete {
        id: Uuid,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TargetKind {
    Sync,
    Process,
    Workflow,
}

#[derive(Args)]
struct TargetArgs {
    kind: TargetKind,
    /// Task id, or workflow UUID.
    id: String,
}

impl TargetArgs {
    fn target(&self) -> Result<RunTarget> {
        Ok(match self.kind {
            TargetKind::Sync => RunTarget::SyncTask(self.id.parse().context("task ids are integers")?),
            TargetKind::Process => RunTarget::ProcessTask(self.id.parse().context("task ids are integers")?),
            TargetKind::Workflow => RunTarget::Workflow(self.id.parse().context("workflow ids are UUIDs")?),
        })
    }
}

/// The part of a workflow document `validate` needs.
#[derive(Deserialize)]
struct GraphFile {
    nodes: Vec<WireNode>,
    #[serde(default)]
    canvas: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let client = || -> Result<HttpBackend> {
        let config = BackendConfig {
            base_url: cli.backend_url.clone(),
            ..BackendConfig::default()
        };
        Ok(HttpBackend::new(&config)?)
    };

    match &cli.command {
        Command::Serve { bind, seed } => {
            let store = MemoryBackend::new();
            if *seed {
                api::seed_demo(&store);
            }
            let listener = TcpListener::bind(bind)
                .await
                .with_context(|| format!("cannot bind {bind}"))?;
            api::serve(listener, store).await?;
        }
        Command::Validate { path } => validate(path).await?,
        Command::Inspect { id } => inspect(&client()?, *id).await?,
        Command::Watch(target) => {
            let backend = Arc::new(client()?);
            let mut poller = LogPoller::new(backend, PollerConfig::default());
            poller.subscribe(target.target()?);
            watch(&mut poller).await?;
        }
        Command::Run { target, watch: follow } => {
            let target = target.target()?;
            let backend = Arc::new(client()?);
            let trigger = RunTrigger::new(backend.clone(), TriggerConfig::default());
            let mut poller = LogPoller::new(backend, PollerConfig::default());

            match monitor::run_and_watch(&trigger, &mut poller, target).await {
                TriggerOutcome::Started(message) => println!("{message}"),
                TriggerOutcome::Dropped => println!("{target}: already requested"),
                TriggerOutcome::Failed(message) => bail!(message),
            }
            if *follow {
                watch(&mut poller).await?;
            }
        }
        Command::Status { id, enable, .. } => {
            client()?.set_status(*id, *enable).await?;
            println!("workflow {id} {}", if *enable { "enabled" } else { "disabled" });
        }
        Command::Delete { id } => {
            client()?.delete_workflow(*id).await?;
            println!("workflow {id} deleted");
        }
    }

    Ok(())
}

async fn validate(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let file: GraphFile = serde_json::from_str(&content).context("not a workflow document")?;

    // Offline: task details are not resolved, nodes show their bare ids.
    let catalog = MemoryBackend::new();
    let loaded = engine::from_wire(&file.nodes, &file.canvas, &catalog, &CancellationToken::new()).await?;

    for healed in &loaded.healed {
        println!("dropped: {healed:?}");
    }
    if loaded.dag.is_empty() {
        bail!(engine::EngineError::EmptyWorkflow);
    }
    println!("{} nodes, {} edges", loaded.dag.len(), loaded.dag.edges().len());
    print_order(&loaded.dag);

    if !loaded.healed.is_empty() {
        bail!("{} inconsistent entries", loaded.healed.len());
    }
    Ok(())
}

async fn inspect(backend: &HttpBackend, id: Uuid) -> Result<()> {
    let (mut editor, _commands) = Editor::new(CatalogConfig::default(), MemorySurface::new);
    let notices = editor
        .load(backend, backend, id, EditMode::Preview, &CancellationToken::new())
        .await?;
    for notice in notices {
        println!("{:?}: {}", notice.level, notice.message);
    }

    let meta = editor.meta();
    println!("{} ({id})", meta.name);
    if !meta.description.is_empty() {
        println!("  {}", meta.description);
    }
    for node in editor.surface().nodes() {
        let detail = node.data.detail.unwrap_or_default();
        println!("  [{}] {:<24} {}", node.data.badge, node.data.label, detail);
    }
    print_order(editor.dag());
    Ok(())
}

fn print_order(dag: &DagModel) {
    let names: Vec<&str> = dag
        .topological_order()
        .into_iter()
        .filter_map(|id| dag.node(&id).map(|n| n.name.as_str()))
        .collect();
    println!("execution order: {}", names.join(" → "));
}

async fn watch(poller: &mut LogPoller) -> Result<()> {
    let mut view = poller.view();
    info!("watching run history, Ctrl-C to stop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = view.changed() => {
                changed?;
                let current = view.borrow_and_update().clone();
                if let Some(error) = &current.error {
                    println!("fetch failed: {error}");
                    continue;
                }
                println!("{} runs", current.total);
                for entry in &current.entries {
                    println!("{}", format_entry(entry));
                }
            }
        }
    }
    poller.unsubscribe();
    Ok(())
}

fn format_entry(entry: &RunLogEntry) -> String {
    let end = entry
        .end_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_owned());
    let count = entry.sync_count.map(|c| c.to_string()).unwrap_or_default();
    format!(
        "  #{:<6} {:<8} {} → {}  {:>8}  {:?}",
        entry.id,
        entry.status,
        entry.start_time.format("%Y-%m-%d %H:%M:%S"),
        end,
        count,
        entry.sync_method,
    )
}

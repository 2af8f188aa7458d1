use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use progenitor_core::{init_logging, AppConfig};
use progenitor_io::{from_json, to_json, to_json_pretty, write_json_file, ArtifactStore};
use progenitor_lib::pipeline::orchestrator::labels_by_kind;
use progenitor_lib::pipeline::workflow::build_orchestrator;
use progenitor_lib::pipeline::{InProcessRunner, SubprocessRunner, TaskParams, TaskRegistry, TaskRunner, TaskSpec};
use std::path::PathBuf;
use std::sync::Arc;

const REPORT_FILE: &str = "pipeline_report.json";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Custom config file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Artifact store root, overrides `store.root`
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and execute the standard workflow
    Run {
        /// Copy cached simulation data instead of fitting
        #[arg(long)]
        cached: bool,

        /// Cache artifact used with --cached
        #[arg(long)]
        cached_data: Option<PathBuf>,

        /// Run tasks on worker threads of this process instead of child processes
        #[arg(long)]
        in_process: bool,
    },
    /// Execute a single task from a JSON parameter map
    Task {
        /// Task type, e.g. fit_sim_data
        kind: String,

        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// Print the manifests of the standard workflow as JSON
    Describe,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(&args.config)
        .with_context(|| format!("loading {:?}", args.config))?;
    if let Some(root) = args.store {
        config.store.root = root;
    }
    init_logging(&config.logging.level);

    let store = ArtifactStore::new(&config.store.root).with_depth_limit(config.store.depth_budget);

    match args.command {
        Command::Run {
            cached,
            cached_data,
            in_process,
        } => {
            if cached {
                config.pipeline.cached = true;
            }
            if cached_data.is_some() {
                config.pipeline.cached_data = cached_data;
            }
            if in_process {
                config.pipeline.isolate = false;
            }
            config.validate()?;
            tracing::info!(
                root = ?config.store.root,
                fingerprint = %config.fingerprint(),
                "Starting pipeline"
            );

            let runner: Arc<dyn TaskRunner> = if config.pipeline.isolate {
                Arc::new(SubprocessRunner::current_exe()?)
            } else {
                Arc::new(InProcessRunner)
            };
            let report_path = store.resolve(REPORT_FILE);
            let orchestrator = build_orchestrator(&config, store, runner)?;
            let report = orchestrator.run().await?;
            write_json_file(&report, &report_path)?;
            tracing::info!(path = ?report_path, "Report written");
            println!("{}", to_json_pretty(&report)?);
            anyhow::ensure!(
                report.is_success(),
                "{} task(s) failed, {} unreachable",
                report.failed.len(),
                report.unreachable.len()
            );
        }
        Command::Task { kind, params } => {
            let params: TaskParams =
                from_json(&params).context("task parameters must be a JSON object")?;
            let task = TaskRegistry::with_builtins().build(&TaskSpec::new(&kind, params))?;
            let outcome = tokio::task::spawn_blocking(move || task.run(&store)).await??;
            println!("{}", to_json(&outcome)?);
        }
        Command::Describe => {
            let orchestrator = build_orchestrator(&config, store, Arc::new(InProcessRunner))?;
            for (kind, labels) in labels_by_kind(orchestrator.nodes()) {
                tracing::debug!(kind, tasks = labels.len(), "Workflow tasks");
            }
            let manifests: Vec<_> = orchestrator
                .manifests()
                .into_iter()
                .map(|(label, manifest)| serde_json::json!({ "label": label, "manifest": manifest }))
                .collect();
            println!("{}", to_json_pretty(&manifests)?);
        }
    }
    Ok(())
}

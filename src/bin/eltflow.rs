use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eltflow_core::config::loader::load_run_config;
use eltflow_core::config::types::RunConfig;
use eltflow_core::engine::EltFlow;
use eltflow_core::pipelines::finance::finance_pipeline;
use eltflow_core::router::store::FsObjectStore;
use eltflow_core::router::{route, RouteEvent, RouteOutcome};
use eltflow_core::scheduler::state::{RunState, RunStatus};
use eltflow_core::store::db::Store;

#[derive(Parser)]
#[command(name = "eltflow")]
#[command(about = "Scheduled CSV-to-fact-table ELT pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once and exit
    Run {
        /// Pipeline YAML file
        #[arg(long)]
        config: PathBuf,
    },
    /// Run the pipeline on its configured schedule until Ctrl-C
    Schedule {
        #[arg(long)]
        config: PathBuf,
    },
    /// Route one newly landed object out of the intake prefix
    Route {
        #[arg(long)]
        config: PathBuf,
        /// Directory holding one subdirectory per bucket
        #[arg(long)]
        root: PathBuf,
        #[arg(long)]
        bucket: String,
        #[arg(long)]
        object: String,
    },
    /// Show recent runs and their step attempts
    History {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn load(path: &Path) -> anyhow::Result<Arc<RunConfig>> {
    let config = load_run_config(path).with_context(|| format!("loading {}", path.display()))?;
    Ok(Arc::new(config))
}

fn engine(config: Arc<RunConfig>) -> anyhow::Result<EltFlow> {
    let history = config.history_path.clone();
    let (trigger, def) = finance_pipeline(config)?;
    let mut flow = EltFlow::new().add_pipeline(trigger, def);
    if let Some(path) = history {
        flow = flow.history_path(path);
    }
    Ok(flow)
}

fn print_run(state: &RunState) {
    println!("run {} ({}): {}", state.id, state.pipeline, state.status.as_str());
    for name in &state.order {
        let Some(step) = state.step(name) else { continue };
        let error = step.last_error.as_deref().map(|e| format!(" - {e}")).unwrap_or_default();
        println!("  {:<16} {:<10} attempts={}{}", name, step.status.as_str(), step.attempts, error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    eltflow_core::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = load(&config)?;
            let pipeline = config.pipeline.clone();
            let state = engine(config)?.run_once(&pipeline).await?;
            print_run(&state);
            if state.status != RunStatus::Succeeded {
                bail!("run {} failed", state.id);
            }
        }
        Commands::Schedule { config } => {
            let config = load(&config)?;
            tracing::info!(pipeline = %config.pipeline, owner = %config.owner, "scheduling pipeline");
            engine(config)?.run().await?;
        }
        Commands::Route { config, root, bucket, object } => {
            let config = load(&config)?;
            let store = FsObjectStore::new(root);
            let event = RouteEvent { bucket, object_name: object };
            match route(&store, &config.router, &event).await? {
                RouteOutcome::Ignored => println!("ignored {}", event.object_name),
                RouteOutcome::Moved { from, to } => println!("moved {from} -> {to}"),
            }
        }
        Commands::History { config, limit } => {
            let config = load(&config)?;
            let Some(path) = &config.history_path else {
                bail!("no history.path configured; run history is kept in memory");
            };
            let store = Store::open(path).with_context(|| format!("opening {}", path.display()))?;
            for run in store.recent_runs(limit)? {
                println!(
                    "{} {} {} started={} duration_ms={}",
                    run.id,
                    run.pipeline,
                    run.status,
                    run.started_at,
                    run.duration_ms.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
                );
                for attempt in store.task_runs_for(&run.id)? {
                    let error = attempt.error.map(|e| format!(" - {e}")).unwrap_or_default();
                    println!("  {:<16} #{} {}{}", attempt.task_name, attempt.attempt, attempt.status, error);
                }
            }
        }
    }
    Ok(())
}

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use eltflow_utils::error::Error;
use eltflow_utils::EltResult;

use crate::events::bus;
use crate::events::interval::spawn_interval_trigger;
use crate::events::trigger::{Trigger, TriggerEvent};
use crate::scheduler::runner::{self, PipelineDef};
use crate::scheduler::state::RunState;
use crate::store::db::Store;

/// Top-level orchestrator. Register pipelines, then either run one of them
/// once or schedule all of them until shutdown.
#[derive(Default)]
pub struct EltFlow {
    pipelines: Vec<(Trigger, PipelineDef)>,
    history_path: Option<PathBuf>,
}

impl EltFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where run history is kept. Defaults to in-memory.
    pub fn history_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_path = Some(path.into());
        self
    }

    /// Add a pipeline (trigger + definition).
    pub fn add_pipeline(mut self, trigger: Trigger, def: PipelineDef) -> Self {
        self.pipelines.push((trigger, def));
        self
    }

    fn open_store(&self) -> EltResult<Store> {
        let store = match &self.history_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Store::open(path)?
            }
            None => Store::in_memory()?,
        };

        let crashed = store.mark_inflight_as_crashed()?;
        if crashed > 0 {
            tracing::warn!(count = crashed, "marked in-flight runs as crashed from previous session");
        }
        Ok(store)
    }

    /// Execute a single manual run of `pipeline` and return its final state.
    pub async fn run_once(&self, pipeline: &str) -> EltResult<RunState> {
        let (_, def) = self
            .pipelines
            .iter()
            .find(|(_, def)| def.name == pipeline)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown pipeline '{pipeline}'")))?;
        let store = Mutex::new(self.open_store()?);
        Ok(runner::run_pipeline(def, &Trigger::Manual, &store, std::future::pending()).await)
    }

    /// Schedule every pipeline until Ctrl-C.
    pub async fn run(self) -> EltResult<()> {
        let shutdown = tokio::signal::ctrl_c();
        self.run_with_shutdown(async { let _ = shutdown.await; }).await
    }

    /// Schedule with a custom shutdown signal (useful for testing). Interval
    /// pipelines fire on every tick after the first; manual pipelines run once
    /// at start-up.
    pub async fn run_with_shutdown<F: std::future::Future>(self, shutdown: F) -> EltResult<()> {
        let store = Arc::new(Mutex::new(self.open_store()?));

        let (event_tx, event_rx) = bus::channel(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut trigger_handles = Vec::new();
        let mut pipeline_defs = HashMap::new();

        for (trigger, def) in self.pipelines {
            let pipeline_name = def.name.clone();
            match &trigger {
                Trigger::Interval(duration) => {
                    tracing::info!(pipeline = %pipeline_name, every_ms = duration.as_millis() as u64, "interval trigger armed");
                    trigger_handles.push(spawn_interval_trigger(pipeline_name.clone(), *duration, event_tx.clone()));
                }
                Trigger::Manual => {
                    let event = TriggerEvent { pipeline: pipeline_name.clone(), trigger: Trigger::Manual };
                    if event_tx.send(event).await.is_err() {
                        tracing::warn!(pipeline = %pipeline_name, "scheduler unavailable for manual run");
                    }
                }
            }
            pipeline_defs.insert(pipeline_name, def);
        }

        // Drop our copy of the sender so the scheduler sees the channel close
        drop(event_tx);

        let scheduler_handle = tokio::spawn(runner::run_scheduler(
            event_rx,
            pipeline_defs,
            store,
            shutdown_rx,
        ));

        shutdown.await;

        let _ = shutdown_tx.send(true);
        for handle in trigger_handles {
            handle.abort();
        }
        if let Err(e) = scheduler_handle.await {
            tracing::error!(error = %e, "scheduler task ended abnormally");
        }

        tracing::info!("eltflow shutdown complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PipelineBuilder;
    use crate::config::types::RunConfig;
    use crate::scheduler::retry::RetryPolicy;
    use crate::scheduler::state::RunStatus;
    use crate::tasks::traits::{Task, TaskContext};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        count: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Task for Counting {
        fn name(&self) -> &str { "count" }
        async fn run(&self, _ctx: &TaskContext) -> EltResult<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn def(trigger: Trigger, count: Arc<AtomicUsize>) -> (Trigger, PipelineDef) {
        PipelineBuilder::new("test")
            .trigger(trigger)
            .config(Arc::new(RunConfig::new("unused.sqlite", "unused/*.csv")))
            .then(Counting { count }, RetryPolicy::none())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn engine_runs_and_shuts_down() {
        let count = Arc::new(AtomicUsize::new(0));
        let (trigger, def) = def(Trigger::Interval(Duration::from_millis(50)), count.clone());

        EltFlow::new()
            .add_pipeline(trigger, def)
            .run_with_shutdown(tokio::time::sleep(Duration::from_millis(300)))
            .await
            .unwrap();

        let runs = count.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least 2 runs, got {runs}");
    }

    #[tokio::test]
    async fn manual_pipeline_runs_once_when_scheduled() {
        let count = Arc::new(AtomicUsize::new(0));
        let (trigger, def) = def(Trigger::Manual, count.clone());

        EltFlow::new()
            .add_pipeline(trigger, def)
            .run_with_shutdown(tokio::time::sleep(Duration::from_millis(150)))
            .await
            .unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_once_returns_final_state() {
        let count = Arc::new(AtomicUsize::new(0));
        let (trigger, def) = def(Trigger::Manual, count.clone());
        let flow = EltFlow::new().add_pipeline(trigger, def);

        let state = flow.run_once("test").await.unwrap();
        assert_eq!(state.status, RunStatus::Succeeded);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        assert!(flow.run_once("missing").await.is_err());
    }

    #[tokio::test]
    async fn history_survives_between_engines() {
        let dir = tempfile::tempdir().unwrap();
        let history = dir.path().join("state").join("runs.sqlite");
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let (trigger, def) = def(Trigger::Manual, count.clone());
            EltFlow::new()
                .history_path(&history)
                .add_pipeline(trigger, def)
                .run_once("test")
                .await
                .unwrap();
        }

        let store = Store::open(&history).unwrap();
        assert_eq!(store.recent_runs(10).unwrap().len(), 2);
    }
}

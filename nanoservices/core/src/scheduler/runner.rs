use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::config::types::RunConfig;
use crate::dag::resolver::ResolvedDag;
use crate::events::bus::EventReceiver;
use crate::events::trigger::Trigger;
use crate::scheduler::retry::RetryPolicy;
use crate::scheduler::state::{RunState, RunStatus, StepStatus};
use crate::store::db::{AttemptRecord, Store};
use crate::tasks::traits::{Task, TaskContext};

/// A step of a pipeline: the work, its retry budget and what it waits for.
#[derive(Clone)]
pub struct StepDef {
    pub name: String,
    pub task: Arc<dyn Task>,
    pub retry: RetryPolicy,
    pub upstream: Vec<String>,
}

/// A registered pipeline with its resolved DAG and step implementations.
pub struct PipelineDef {
    pub name: String,
    pub dag: ResolvedDag,
    pub steps: HashMap<String, StepDef>,
    pub config: Arc<RunConfig>,
}

/// Run one pipeline to completion, or until `shutdown` resolves, in which
/// case the run is abandoned and recorded as failed.
pub async fn run_pipeline<F>(
    pipeline: &PipelineDef,
    trigger: &Trigger,
    store: &Mutex<Store>,
    shutdown: F,
) -> RunState
where
    F: Future<Output = ()>,
{
    let run_id = Uuid::new_v4().to_string();
    let mut state = RunState::new(run_id.clone(), pipeline.name.clone(), pipeline.dag.order.clone());

    {
        let store = store.lock().await;
        if let Err(e) = store.insert_pipeline_run(&run_id, &pipeline.name, trigger.kind(), &state.started_at.to_rfc3339()) {
            tracing::warn!(run = %run_id, error = %e, "failed to persist run start");
        }
    }
    tracing::info!(run = %run_id, pipeline = %pipeline.name, trigger = trigger.kind(), "pipeline run started");

    let interrupted = {
        let steps = execute_steps(pipeline, store, &mut state);
        tokio::pin!(steps);
        tokio::select! {
            _ = &mut steps => false,
            _ = shutdown => true,
        }
    };

    if interrupted {
        if let Some(step) = state.running_step() {
            let attempt = state.step(&step).map(|s| s.attempts).unwrap_or(0);
            state.abandon("interrupted by shutdown");
            record_attempt(store, &state, &step, attempt, StepStatus::Failed).await;
        } else {
            state.abandon("interrupted by shutdown");
        }
        tracing::warn!(run = %run_id, pipeline = %pipeline.name, "run abandoned on shutdown");
    }

    finish_run(pipeline, store, &state).await;
    state
}

async fn execute_steps(pipeline: &PipelineDef, store: &Mutex<Store>, state: &mut RunState) {
    while let Some(name) = state.next_pending() {
        let Some(step) = pipeline.steps.get(&name) else {
            state.step_failed(&name, format!("step '{name}' has no implementation"));
            break;
        };

        let attempt = state.step_started(&name);
        let ctx = TaskContext {
            run_id: state.id.clone(),
            pipeline: pipeline.name.clone(),
            attempt,
            config: pipeline.config.clone(),
        };
        tracing::info!(run = %state.id, step = %name, attempt, "step started");

        match step.task.run(&ctx).await {
            Ok(()) => {
                state.step_succeeded(&name);
                record_attempt(store, state, &name, attempt, StepStatus::Succeeded).await;
                tracing::info!(run = %state.id, step = %name, attempt, "step succeeded");
            }
            Err(e) if step.retry.should_retry(attempt, &e) => {
                state.step_retrying(&name, e.to_string());
                record_attempt(store, state, &name, attempt, StepStatus::Failed).await;
                crate::metrics::inc_retry(&pipeline.name, &name);
                tracing::warn!(
                    run = %state.id,
                    step = %name,
                    attempt,
                    error = %e,
                    delay_ms = step.retry.delay.as_millis() as u64,
                    "step failed, retrying"
                );
                tokio::time::sleep(step.retry.delay).await;
            }
            Err(e) => {
                state.step_failed(&name, e.to_string());
                record_attempt(store, state, &name, attempt, StepStatus::Failed).await;
                tracing::error!(
                    run = %state.id,
                    step = %name,
                    attempt,
                    transient = e.is_transient(),
                    error = %e,
                    "step failed"
                );
            }
        }
    }
}

async fn record_attempt(store: &Mutex<Store>, state: &RunState, step: &str, attempt: u32, status: StepStatus) {
    let Some(step_state) = state.step(step) else { return };
    let finished = chrono::Utc::now();
    let started = step_state.started_at.unwrap_or(finished);
    let (started_at, finished_at) = (started.to_rfc3339(), finished.to_rfc3339());
    let id = Uuid::new_v4().to_string();
    let error = match status {
        StepStatus::Failed => step_state.last_error.as_deref(),
        _ => None,
    };
    let record = AttemptRecord {
        id: &id,
        run_id: &state.id,
        task_name: step,
        attempt,
        status: status.as_str(),
        started_at: &started_at,
        finished_at: Some(&finished_at),
        duration_ms: Some((finished - started).num_milliseconds()),
        error,
    };
    let store = store.lock().await;
    if let Err(e) = store.insert_task_run(&record) {
        tracing::warn!(run = %state.id, step, error = %e, "failed to persist step attempt");
    }
}

async fn finish_run(pipeline: &PipelineDef, store: &Mutex<Store>, state: &RunState) {
    let duration = state.duration_ms();
    let finished_at = state.finished_at.unwrap_or_else(chrono::Utc::now).to_rfc3339();
    {
        let store = store.lock().await;
        if let Err(e) = store.complete_pipeline_run(&state.id, state.status.as_str(), &finished_at, duration) {
            tracing::warn!(run = %state.id, error = %e, "failed to persist run result");
        }
    }

    crate::metrics::inc_run(&pipeline.name);
    crate::metrics::observe_duration(&pipeline.name, duration as f64);
    if state.status == RunStatus::Failed {
        crate::metrics::inc_failure(&pipeline.name);
    }
    tracing::info!(
        run = %state.id,
        pipeline = %pipeline.name,
        status = state.status.as_str(),
        duration_ms = duration,
        "pipeline run finished"
    );
}

/// Resolves once the shutdown flag is set. Never resolves if the sender is
/// gone without having signalled.
async fn shutdown_signalled(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// The scheduler loop. Receives trigger events and executes one run at a
/// time, so runs never overlap. Each event is released once its run ends so
/// the interval producer can queue the next tick.
pub async fn run_scheduler(
    mut event_rx: EventReceiver,
    pipelines: HashMap<String, PipelineDef>,
    store: Arc<Mutex<Store>>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    tracing::info!("trigger channel closed");
                    break;
                };
                let Some(pipeline) = pipelines.get(&event.pipeline) else {
                    tracing::warn!(pipeline = %event.pipeline, "received trigger for unknown pipeline");
                    event_rx.release(&event);
                    continue;
                };

                run_pipeline(pipeline, &event.trigger, &store, shutdown_signalled(shutdown_rx.clone())).await;
                event_rx.release(&event);
                if *shutdown_rx.borrow() {
                    tracing::info!("scheduler shutting down");
                    break;
                }
            }

            _ = shutdown_rx.changed() => {
                tracing::info!("scheduler shutting down");
                break;
            }
        }
    }
}

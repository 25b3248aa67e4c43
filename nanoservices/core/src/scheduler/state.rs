use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

/// Status of an individual step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepState {
    pub status: StepStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Start of the current or most recent attempt
    pub started_at: Option<DateTime<Utc>>,
}

/// In-memory state for a single pipeline run. Steps run one at a time in
/// `order`; a step only becomes eligible once every earlier step succeeded.
#[derive(Debug, Clone)]
pub struct RunState {
    pub id: String,
    pub pipeline: String,
    pub status: RunStatus,
    pub order: Vec<String>,
    pub steps: HashMap<String, StepState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    pub fn new(id: String, pipeline: String, order: Vec<String>) -> Self {
        let steps = order
            .iter()
            .map(|name| {
                let step = StepState {
                    status: StepStatus::Pending,
                    attempts: 0,
                    last_error: None,
                    started_at: None,
                };
                (name.clone(), step)
            })
            .collect();
        Self {
            id,
            pipeline,
            status: RunStatus::Pending,
            order,
            steps,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepState> {
        self.steps.get(name)
    }

    /// The next step to attempt, if the run is still going.
    pub fn next_pending(&self) -> Option<String> {
        if self.status.is_finished() {
            return None;
        }
        self.order
            .iter()
            .find(|name| self.steps.get(*name).map(|s| s.status) != Some(StepStatus::Succeeded))
            .filter(|name| self.steps.get(*name).map(|s| s.status) == Some(StepStatus::Pending))
            .cloned()
    }

    /// The step currently running, if any.
    pub fn running_step(&self) -> Option<String> {
        self.order
            .iter()
            .find(|name| self.steps.get(*name).map(|s| s.status) == Some(StepStatus::Running))
            .cloned()
    }

    /// Mark a step running and return its 1-based attempt number.
    pub fn step_started(&mut self, name: &str) -> u32 {
        self.status = RunStatus::Running;
        match self.steps.get_mut(name) {
            Some(step) => {
                step.status = StepStatus::Running;
                step.attempts += 1;
                step.started_at = Some(Utc::now());
                step.attempts
            }
            None => 0,
        }
    }

    pub fn step_succeeded(&mut self, name: &str) {
        if let Some(step) = self.steps.get_mut(name) {
            step.status = StepStatus::Succeeded;
            step.last_error = None;
        }
        if self.steps.values().all(|s| s.status == StepStatus::Succeeded) {
            self.finish(RunStatus::Succeeded);
        }
    }

    /// A failed attempt that will be tried again: back to pending.
    pub fn step_retrying(&mut self, name: &str, error: String) {
        if let Some(step) = self.steps.get_mut(name) {
            step.status = StepStatus::Pending;
            step.last_error = Some(error);
        }
    }

    /// Final failure of a step. Every step that has not run yet is skipped
    /// and the run fails.
    pub fn step_failed(&mut self, name: &str, error: String) {
        if let Some(step) = self.steps.get_mut(name) {
            step.status = StepStatus::Failed;
            step.last_error = Some(error);
        }
        for step in self.steps.values_mut() {
            if step.status == StepStatus::Pending {
                step.status = StepStatus::Skipped;
            }
        }
        self.finish(RunStatus::Failed);
    }

    /// Stop the run from outside (shutdown). The running step, if any, fails.
    pub fn abandon(&mut self, reason: &str) {
        match self.running_step() {
            Some(name) => self.step_failed(&name, reason.to_string()),
            None => {
                for step in self.steps.values_mut() {
                    if step.status == StepStatus::Pending {
                        step.status = StepStatus::Skipped;
                    }
                }
                self.finish(RunStatus::Failed);
            }
        }
    }

    pub fn duration_ms(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }

    fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunState {
        RunState::new(
            "run-1".to_string(),
            "finance".to_string(),
            vec!["reset".into(), "load".into(), "transform".into(), "report".into()],
        )
    }

    #[test]
    fn steps_start_pending_in_order() {
        let state = run();
        assert_eq!(state.status, RunStatus::Pending);
        assert!(state.steps.values().all(|s| s.status == StepStatus::Pending));
        assert_eq!(state.next_pending().as_deref(), Some("reset"));
    }

    #[test]
    fn succeeding_every_step_finishes_the_run() {
        let mut state = run();
        while let Some(step) = state.next_pending() {
            assert_eq!(state.step_started(&step), 1);
            assert_eq!(state.status, RunStatus::Running);
            state.step_succeeded(&step);
        }
        assert_eq!(state.status, RunStatus::Succeeded);
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn running_step_blocks_the_next_one() {
        let mut state = run();
        state.step_started("reset");
        assert_eq!(state.next_pending(), None);
        assert_eq!(state.running_step().as_deref(), Some("reset"));
    }

    #[test]
    fn retry_returns_step_to_pending() {
        let mut state = run();
        state.step_started("reset");
        state.step_succeeded("reset");
        state.step_started("load");
        state.step_retrying("load", "database is locked".into());

        assert_eq!(state.next_pending().as_deref(), Some("load"));
        assert_eq!(state.step_started("load"), 2);
        assert_eq!(state.step("load").unwrap().last_error.as_deref(), Some("database is locked"));
    }

    #[test]
    fn failure_skips_downstream_steps() {
        let mut state = run();
        state.step_started("reset");
        state.step_succeeded("reset");
        state.step_started("load");
        state.step_failed("load", "boom".into());

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.step("reset").unwrap().status, StepStatus::Succeeded);
        assert_eq!(state.step("load").unwrap().status, StepStatus::Failed);
        assert_eq!(state.step("transform").unwrap().status, StepStatus::Skipped);
        assert_eq!(state.step("report").unwrap().status, StepStatus::Skipped);
        assert_eq!(state.next_pending(), None);
    }

    #[test]
    fn abandon_fails_the_running_step() {
        let mut state = run();
        state.step_started("reset");
        state.abandon("shutdown");

        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.step("reset").unwrap().status, StepStatus::Failed);
        assert_eq!(state.step("reset").unwrap().last_error.as_deref(), Some("shutdown"));
        assert_eq!(state.step("load").unwrap().status, StepStatus::Skipped);
    }
}

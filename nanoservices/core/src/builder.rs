use std::collections::HashMap;
use std::sync::Arc;

use crate::config::types::RunConfig;
use crate::dag::node::TaskNode;
use crate::dag::resolver::{self, DagError};
use crate::events::trigger::Trigger;
use crate::scheduler::retry::RetryPolicy;
use crate::scheduler::runner::{PipelineDef, StepDef};
use crate::tasks::traits::Task;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("trigger is required")]
    NoTrigger,
    #[error("run configuration is required")]
    NoConfig,
    #[error("at least one step is required")]
    NoSteps,
    #[error("DAG resolution failed: {0}")]
    DagError(#[from] DagError),
}

pub struct PipelineBuilder {
    name: String,
    trigger: Option<Trigger>,
    config: Option<Arc<RunConfig>>,
    steps: Vec<StepDef>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trigger: None,
            config: None,
            steps: Vec::new(),
        }
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn config(mut self, config: Arc<RunConfig>) -> Self {
        self.config = Some(config);
        self
    }

    /// Append a step that runs after the previously added one.
    pub fn then(self, task: impl Task + 'static, retry: RetryPolicy) -> Self {
        let upstream: Vec<String> = self.steps.last().map(|s| s.name.clone()).into_iter().collect();
        let upstream: Vec<&str> = upstream.iter().map(String::as_str).collect();
        self.step(task, retry, &upstream)
    }

    /// Add a step with explicit upstream steps.
    pub fn step(mut self, task: impl Task + 'static, retry: RetryPolicy, upstream: &[&str]) -> Self {
        let task: Arc<dyn Task> = Arc::new(task);
        self.steps.push(StepDef {
            name: task.name().to_string(),
            task,
            retry,
            upstream: upstream.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn build(self) -> Result<(Trigger, PipelineDef), BuildError> {
        let trigger = self.trigger.ok_or(BuildError::NoTrigger)?;
        let config = self.config.ok_or(BuildError::NoConfig)?;
        if self.steps.is_empty() {
            return Err(BuildError::NoSteps);
        }

        let nodes: Vec<TaskNode> = self
            .steps
            .iter()
            .map(|s| TaskNode { name: s.name.clone(), upstream: s.upstream.clone() })
            .collect();
        let dag = resolver::resolve(nodes)?;

        let steps: HashMap<String, StepDef> = self
            .steps
            .into_iter()
            .map(|s| (s.name.clone(), s))
            .collect();

        Ok((trigger, PipelineDef {
            name: self.name,
            dag,
            steps,
            config,
        }))
    }
}

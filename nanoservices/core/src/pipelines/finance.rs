use std::sync::Arc;

use crate::builder::{BuildError, PipelineBuilder};
use crate::config::types::RunConfig;
use crate::events::trigger::Trigger;
use crate::scheduler::runner::PipelineDef;
use crate::tasks::load::LoadStaging;
use crate::tasks::report::ReportMetrics;
use crate::tasks::reset::ResetTables;
use crate::tasks::transform::BuildFacts;
use crate::tasks::{LOAD_STAGING, REPORT_METRICS, RESET_TABLES, TRANSFORM_FACTS};

/// Reset, load, transform and report, in that order, with per-step retry
/// policies taken from the configuration.
pub fn finance_pipeline(config: Arc<RunConfig>) -> Result<(Trigger, PipelineDef), BuildError> {
    PipelineBuilder::new(config.pipeline.clone())
        .trigger(config.trigger.clone())
        .config(config.clone())
        .then(ResetTables, config.retry_for(RESET_TABLES))
        .then(LoadStaging, config.retry_for(LOAD_STAGING))
        .then(BuildFacts, config.retry_for(TRANSFORM_FACTS))
        .then(ReportMetrics, config.retry_for(REPORT_METRICS))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::retry::RetryPolicy;
    use std::time::Duration;

    #[test]
    fn steps_form_a_linear_chain() {
        let config = Arc::new(RunConfig::new("dw.sqlite", "staging/*.csv"));
        let (trigger, def) = finance_pipeline(config).unwrap();

        assert_eq!(def.name, "elt_duckdb_pipeline");
        assert_eq!(trigger, Trigger::Interval(Duration::from_secs(86_400)));
        assert_eq!(def.dag.order, vec![RESET_TABLES, LOAD_STAGING, TRANSFORM_FACTS, REPORT_METRICS]);
        assert_eq!(def.steps[TRANSFORM_FACTS].upstream, vec![LOAD_STAGING]);
        assert!(def.steps.values().all(|s| s.retry == RetryPolicy::new(1, Duration::from_secs(120))));
    }

    #[test]
    fn per_step_overrides_apply() {
        let mut config = RunConfig::new("dw.sqlite", "staging/*.csv");
        config.task_retry.insert(LOAD_STAGING.to_string(), RetryPolicy::new(3, Duration::from_secs(5)));
        let (_, def) = finance_pipeline(Arc::new(config)).unwrap();

        assert_eq!(def.steps[LOAD_STAGING].retry.retries, 3);
        assert_eq!(def.steps[RESET_TABLES].retry.retries, 1);
    }
}

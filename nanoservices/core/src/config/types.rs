use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::events::trigger::Trigger;
use crate::scheduler::retry::RetryPolicy;

pub const DEFAULT_STAGING_TABLE: &str = "staging_raw";
pub const DEFAULT_FACT_TABLE: &str = "fact_finanzas_elt";

/// Pipeline file as written on disk.
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    pub pipeline: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub trigger: TriggerConfig,
    pub warehouse: WarehouseConfig,
    pub intake: IntakeConfig,
    #[serde(default)]
    pub defaults: RetryConfig,
    /// Per-step retry overrides keyed by step name
    #[serde(default)]
    pub tasks: HashMap<String, RetryConfig>,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub router: RouterConfig,
}

#[derive(Debug, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: String,
    /// For interval triggers: e.g. "60s", "24h"
    pub every: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseConfig {
    pub path: String,
    #[serde(default = "default_staging_table")]
    pub staging_table: String,
    #[serde(default = "default_fact_table")]
    pub fact_table: String,
}

#[derive(Debug, Deserialize)]
pub struct IntakeConfig {
    pub glob: String,
    #[serde(default)]
    pub on_empty: EmptyIntake,
}

/// What the raw loader does when the intake glob matches no files.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmptyIntake {
    /// Load an empty staging relation
    #[default]
    Empty,
    /// Fail the load step
    Fail,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct RetryConfig {
    pub retries: Option<u32>,
    pub retry_delay: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryConfig {
    pub path: Option<String>,
}

/// Object-storage routing prefixes.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RouterConfig {
    pub intake_prefix: String,
    pub spreadsheet_prefix: String,
    pub image_prefix: String,
    pub other_prefix: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            intake_prefix: "raw/".to_string(),
            spreadsheet_prefix: "processed/excel/".to_string(),
            image_prefix: "processed/images/".to_string(),
            other_prefix: "processed/other/".to_string(),
        }
    }
}

fn default_staging_table() -> String {
    DEFAULT_STAGING_TABLE.to_string()
}

fn default_fact_table() -> String {
    DEFAULT_FACT_TABLE.to_string()
}

/// Validated, immutable run parameters. Built once and shared by every step
/// of every run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pipeline: String,
    pub description: Option<String>,
    pub owner: String,
    pub trigger: Trigger,
    pub warehouse_path: PathBuf,
    pub staging_table: String,
    pub fact_table: String,
    pub intake_glob: String,
    pub on_empty: EmptyIntake,
    pub default_retry: RetryPolicy,
    pub task_retry: HashMap<String, RetryPolicy>,
    pub history_path: Option<PathBuf>,
    pub router: RouterConfig,
}

impl RunConfig {
    /// Reference configuration: daily schedule, one retry after two minutes.
    pub fn new(warehouse_path: impl Into<PathBuf>, intake_glob: impl Into<String>) -> Self {
        Self {
            pipeline: "elt_duckdb_pipeline".to_string(),
            description: None,
            owner: "data_engineer".to_string(),
            trigger: Trigger::Interval(Duration::from_secs(24 * 60 * 60)),
            warehouse_path: warehouse_path.into(),
            staging_table: DEFAULT_STAGING_TABLE.to_string(),
            fact_table: DEFAULT_FACT_TABLE.to_string(),
            intake_glob: intake_glob.into(),
            on_empty: EmptyIntake::Empty,
            default_retry: RetryPolicy::new(1, Duration::from_secs(120)),
            task_retry: HashMap::new(),
            history_path: None,
            router: RouterConfig::default(),
        }
    }

    pub fn with_default_retry(mut self, retry: RetryPolicy) -> Self {
        self.default_retry = retry;
        self
    }

    pub fn with_on_empty(mut self, on_empty: EmptyIntake) -> Self {
        self.on_empty = on_empty;
        self
    }

    /// Retry policy for a step, falling back to the pipeline default.
    pub fn retry_for(&self, step: &str) -> RetryPolicy {
        self.task_retry.get(step).copied().unwrap_or(self.default_retry)
    }
}

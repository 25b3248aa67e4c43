use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::types::{PipelineConfig, RetryConfig, RunConfig};
use crate::events::trigger::Trigger;
use crate::scheduler::retry::RetryPolicy;
use crate::tasks::{LOAD_STAGING, REPORT_METRICS, RESET_TABLES, TRANSFORM_FACTS};

const STEPS: [&str; 4] = [RESET_TABLES, LOAD_STAGING, TRANSFORM_FACTS, REPORT_METRICS];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid duration '{0}' (expected e.g. 500ms, 30s, 2m, 24h, 1d)")]
    Duration(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<ConfigError> for eltflow_utils::error::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => Self::IoError(e),
            ConfigError::Yaml(e) => Self::YamlError(e),
            other => Self::InvalidConfig(other.to_string()),
        }
    }
}

/// Load a pipeline config from a YAML file.
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<PipelineConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_pipeline(&content)
}

/// Parse a pipeline config from a YAML string.
pub fn parse_pipeline(yaml: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Load and resolve in one go.
pub fn load_run_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    resolve(load_pipeline(path)?)
}

/// Validate a parsed config and turn it into run parameters.
pub fn resolve(config: PipelineConfig) -> Result<RunConfig, ConfigError> {
    let trigger = match config.trigger.trigger_type.as_str() {
        "interval" => {
            let every = config.trigger.every.as_deref().ok_or_else(|| {
                ConfigError::Invalid("interval trigger needs 'every'".to_string())
            })?;
            let every = parse_duration(every)?;
            if every.is_zero() {
                return Err(ConfigError::Invalid("interval must be positive".to_string()));
            }
            Trigger::Interval(every)
        }
        "manual" => Trigger::Manual,
        other => return Err(ConfigError::Invalid(format!("unknown trigger type '{other}'"))),
    };

    for (key, value) in [
        ("pipeline", &config.pipeline),
        ("warehouse.path", &config.warehouse.path),
        ("warehouse.staging_table", &config.warehouse.staging_table),
        ("warehouse.fact_table", &config.warehouse.fact_table),
        ("intake.glob", &config.intake.glob),
        ("router.intake_prefix", &config.router.intake_prefix),
        ("router.spreadsheet_prefix", &config.router.spreadsheet_prefix),
        ("router.image_prefix", &config.router.image_prefix),
        ("router.other_prefix", &config.router.other_prefix),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("'{key}' must not be empty")));
        }
    }
    if config.warehouse.staging_table == config.warehouse.fact_table {
        return Err(ConfigError::Invalid(
            "staging and fact tables must be different".to_string(),
        ));
    }

    if let Some(step) = config.tasks.keys().find(|step| !STEPS.contains(&step.as_str())) {
        return Err(ConfigError::Invalid(format!(
            "unknown step '{step}' under 'tasks' (expected one of {})",
            STEPS.join(", ")
        )));
    }

    let base = RunConfig::new(&config.warehouse.path, &config.intake.glob);
    let default_retry = retry_policy(&config.defaults, base.default_retry)?;
    let task_retry = config
        .tasks
        .iter()
        .map(|(step, overrides)| Ok((step.clone(), retry_policy(overrides, default_retry)?)))
        .collect::<Result<HashMap<_, _>, ConfigError>>()?;

    Ok(RunConfig {
        pipeline: config.pipeline,
        description: config.description,
        owner: config.owner.unwrap_or(base.owner),
        trigger,
        warehouse_path: base.warehouse_path,
        staging_table: config.warehouse.staging_table,
        fact_table: config.warehouse.fact_table,
        intake_glob: base.intake_glob,
        on_empty: config.intake.on_empty,
        default_retry,
        task_retry,
        history_path: config.history.path.map(PathBuf::from),
        router: config.router,
    })
}

fn retry_policy(overrides: &RetryConfig, fallback: RetryPolicy) -> Result<RetryPolicy, ConfigError> {
    let delay = match overrides.retry_delay.as_deref() {
        Some(raw) => parse_duration(raw)?,
        None => fallback.delay,
    };
    Ok(RetryPolicy::new(overrides.retries.unwrap_or(fallback.retries), delay))
}

/// Parse `<n><unit>` with unit one of `ms`, `s`, `m`, `h`, `d`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| ConfigError::Duration(raw.to_string()))?;
    let (digits, unit) = raw.split_at(split);
    let n: u64 = digits.parse().map_err(|_| ConfigError::Duration(raw.to_string()))?;
    let seconds_per_unit = match unit {
        "ms" => return Ok(Duration::from_millis(n)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(ConfigError::Duration(raw.to_string())),
    };
    n.checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Duration(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::EmptyIntake;

    const REFERENCE: &str = r#"
pipeline: elt_duckdb_pipeline
description: "Daily finance ELT"
owner: data_engineer

trigger:
  type: interval
  every: 24h

warehouse:
  path: /opt/airflow/dw.sqlite

intake:
  glob: /opt/airflow/staging/*.csv

defaults:
  retries: 1
  retry_delay: 2m

tasks:
  load_staging:
    retries: 3
"#;

    #[test]
    fn parse_reference_pipeline() {
        let config = parse_pipeline(REFERENCE).unwrap();
        assert_eq!(config.pipeline, "elt_duckdb_pipeline");
        assert_eq!(config.trigger.trigger_type, "interval");
        assert_eq!(config.trigger.every.as_deref(), Some("24h"));
        assert_eq!(config.warehouse.staging_table, "staging_raw");
        assert_eq!(config.warehouse.fact_table, "fact_finanzas_elt");
        assert_eq!(config.intake.on_empty, EmptyIntake::Empty);
        assert_eq!(config.tasks["load_staging"].retries, Some(3));
        assert_eq!(config.router.intake_prefix, "raw/");
    }

    #[test]
    fn resolve_applies_defaults_and_overrides() {
        let run = resolve(parse_pipeline(REFERENCE).unwrap()).unwrap();
        assert!(matches!(run.trigger, Trigger::Interval(d) if d == Duration::from_secs(86_400)));
        assert_eq!(run.default_retry, RetryPolicy::new(1, Duration::from_secs(120)));
        assert_eq!(run.retry_for("load_staging"), RetryPolicy::new(3, Duration::from_secs(120)));
        assert_eq!(run.retry_for("transform_facts"), run.default_retry);
        assert_eq!(run.warehouse_path, PathBuf::from("/opt/airflow/dw.sqlite"));
        assert!(run.history_path.is_none());
    }

    #[test]
    fn manual_trigger_and_fail_on_empty() {
        let yaml = r#"
pipeline: adhoc
trigger:
  type: manual
warehouse:
  path: dw.sqlite
  fact_table: facts
intake:
  glob: "staging/**/*.csv"
  on_empty: fail
history:
  path: runs.sqlite
router:
  intake_prefix: incoming/
"#;
        let run = resolve(parse_pipeline(yaml).unwrap()).unwrap();
        assert!(matches!(run.trigger, Trigger::Manual));
        assert_eq!(run.on_empty, EmptyIntake::Fail);
        assert_eq!(run.fact_table, "facts");
        assert_eq!(run.history_path, Some(PathBuf::from("runs.sqlite")));
        assert_eq!(run.router.intake_prefix, "incoming/");
        assert_eq!(run.router.image_prefix, "processed/images/");
    }

    #[test]
    fn rejects_invalid_configs() {
        let same_tables = REFERENCE.replace(
            "path: /opt/airflow/dw.sqlite",
            "path: dw.sqlite\n  staging_table: t\n  fact_table: t",
        );
        assert!(matches!(resolve(parse_pipeline(&same_tables).unwrap()), Err(ConfigError::Invalid(_))));

        let bad_delay = REFERENCE.replace("retry_delay: 2m", "retry_delay: soon");
        assert!(matches!(resolve(parse_pipeline(&bad_delay).unwrap()), Err(ConfigError::Duration(_))));

        let bad_trigger = REFERENCE.replace("type: interval", "type: cron");
        assert!(matches!(resolve(parse_pipeline(&bad_trigger).unwrap()), Err(ConfigError::Invalid(_))));

        let zero = REFERENCE.replace("every: 24h", "every: 0s");
        assert!(matches!(resolve(parse_pipeline(&zero).unwrap()), Err(ConfigError::Invalid(_))));

        let typo = REFERENCE.replace("  load_staging:", "  transform:");
        let err = resolve(parse_pipeline(&typo).unwrap()).unwrap_err();
        assert!(matches!(&err, ConfigError::Invalid(msg) if msg.contains("'transform'")));
    }

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert!(matches!(parse_duration("300000000000000d"), Err(ConfigError::Duration(_))));
        assert!(matches!(parse_duration("99999999999999999999s"), Err(ConfigError::Duration(_))));
        assert!(parse_duration("15").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("5 weeks").is_err());
    }
}

use once_cell::sync::Lazy;
use prometheus::{CounterVec, Encoder, HistogramVec, IntGauge, Opts, Registry, TextEncoder};

// Global registry and metrics are initialized lazily.
static REGISTRY: Lazy<Registry> =
    Lazy::new(|| Registry::new_custom(Some("eltflow".to_string()), None).unwrap_or_default());

static PIPELINE_DURATION_MS: Lazy<Option<HistogramVec>> = Lazy::new(|| {
    let opts = Opts::new("pipeline_duration_ms", "Pipeline run duration in milliseconds");
    let hist = HistogramVec::new(prometheus::HistogramOpts::from(opts), &["pipeline_name"]).ok()?;
    REGISTRY.register(Box::new(hist.clone())).ok();
    Some(hist)
});

static PIPELINE_RUNS: Lazy<Option<CounterVec>> =
    Lazy::new(|| counter("pipeline_runs_total", "Total pipeline runs", &["pipeline_name"]));

static PIPELINE_FAILURES: Lazy<Option<CounterVec>> = Lazy::new(|| {
    counter("pipeline_failures_total", "Total failed pipeline runs", &["pipeline_name"])
});

static STEP_RETRIES: Lazy<Option<CounterVec>> = Lazy::new(|| {
    counter("step_retries_total", "Step attempts scheduled for retry", &["pipeline_name", "step"])
});

static STAGING_ROWS: Lazy<Option<IntGauge>> =
    Lazy::new(|| gauge("staging_rows", "Rows read from staging by the last transform"));

static FACT_ROWS: Lazy<Option<IntGauge>> =
    Lazy::new(|| gauge("fact_rows", "Rows written to the fact table by the last transform"));

static ROWS_DROPPED: Lazy<Option<IntGauge>> =
    Lazy::new(|| gauge("rows_dropped", "Rows filtered or deduplicated by the last transform"));

fn counter(name: &str, help: &str, labels: &[&str]) -> Option<CounterVec> {
    let c = CounterVec::new(Opts::new(name, help), labels).ok()?;
    REGISTRY.register(Box::new(c.clone())).ok();
    Some(c)
}

fn gauge(name: &str, help: &str) -> Option<IntGauge> {
    let g = IntGauge::with_opts(Opts::new(name, help)).ok()?;
    REGISTRY.register(Box::new(g.clone())).ok();
    Some(g)
}

/// Observe a pipeline run duration in milliseconds.
pub fn observe_duration(pipeline_name: &str, duration_ms: f64) {
    if let Some(hist) = PIPELINE_DURATION_MS.as_ref() {
        hist.with_label_values(&[pipeline_name]).observe(duration_ms);
    }
}

/// Increment the run counter for a pipeline.
pub fn inc_run(pipeline_name: &str) {
    if let Some(c) = PIPELINE_RUNS.as_ref() {
        c.with_label_values(&[pipeline_name]).inc();
    }
}

/// Increment the failure counter for a pipeline.
pub fn inc_failure(pipeline_name: &str) {
    if let Some(c) = PIPELINE_FAILURES.as_ref() {
        c.with_label_values(&[pipeline_name]).inc();
    }
}

/// Count a step attempt that failed and will be retried.
pub fn inc_retry(pipeline_name: &str, step: &str) {
    if let Some(c) = STEP_RETRIES.as_ref() {
        c.with_label_values(&[pipeline_name, step]).inc();
    }
}

/// Record row counts around the fact transform.
pub fn set_row_counts(before: usize, after: usize) {
    let (before, after) = (before as i64, after as i64);
    if let Some(g) = STAGING_ROWS.as_ref() {
        g.set(before);
    }
    if let Some(g) = FACT_ROWS.as_ref() {
        g.set(after);
    }
    if let Some(g) = ROWS_DROPPED.as_ref() {
        g.set(before - after);
    }
}

/// Gather metrics as text in Prometheus exposition format.
///
/// ```no_run
/// use eltflow_core::metrics;
/// metrics::inc_run("example_pipeline");
/// println!("{}", metrics::gather_text());
/// ```
pub fn gather_text() -> String {
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    if let Err(e) = TextEncoder::new().encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        inc_run("metrics_test_pipeline");
        inc_failure("metrics_test_pipeline");
        inc_retry("metrics_test_pipeline", "load_staging");
        observe_duration("metrics_test_pipeline", 12.0);

        let body = gather_text();
        assert!(body.contains("eltflow_pipeline_runs_total"));
        assert!(body.contains("eltflow_pipeline_failures_total"));
        assert!(body.contains("eltflow_step_retries_total"));
        assert!(body.contains("eltflow_pipeline_duration_ms"));
        assert!(body.contains("metrics_test_pipeline"));
    }

    #[test]
    fn row_gauges_are_exposed() {
        set_row_counts(5, 3);
        let body = gather_text();
        assert!(body.contains("eltflow_staging_rows"));
        assert!(body.contains("eltflow_fact_rows"));
        assert!(body.contains("eltflow_rows_dropped"));
    }
}

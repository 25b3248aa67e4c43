use async_trait::async_trait;
use eltflow_utils::EltResult;
use std::fmt;

use crate::store::warehouse::{quote_ident, Session};
use crate::tasks::helpers::run_blocking;
use crate::tasks::traits::{Task, TaskContext};
use crate::tasks::REPORT_METRICS;

/// Aggregates over the fact table. Mean and max are `None` when the table is
/// empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactSummary {
    pub total: i64,
    pub mean_utilidad: Option<f64>,
    pub max_utilidad: Option<f64>,
}

impl fmt::Display for FactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn cell(value: Option<f64>) -> String {
            value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "null".to_string())
        }
        writeln!(f, "{:>10} | {:>14} | {:>14}", "total", "mean_utilidad", "max_utilidad")?;
        write!(
            f,
            "{:>10} | {:>14} | {:>14}",
            self.total,
            cell(self.mean_utilidad),
            cell(self.max_utilidad)
        )
    }
}

/// Count, mean and max of `utilidad` in one aggregate query.
pub fn summarize(session: &Session, table: &str) -> EltResult<FactSummary> {
    let sql = format!(
        "SELECT COUNT(*), AVG(utilidad), MAX(utilidad) FROM {}",
        quote_ident(table)
    );
    let summary = session.connection().query_row(&sql, [], |row| {
        Ok(FactSummary {
            total: row.get(0)?,
            mean_utilidad: row.get(1)?,
            max_utilidad: row.get(2)?,
        })
    })?;
    Ok(summary)
}

/// Logs the fact table summary. Produces no table.
pub struct ReportMetrics;

#[async_trait]
impl Task for ReportMetrics {
    fn name(&self) -> &str { REPORT_METRICS }

    async fn run(&self, ctx: &TaskContext) -> EltResult<()> {
        let config = ctx.config.clone();
        let summary = run_blocking(move || {
            let session = Session::open(&config.warehouse_path)?;
            summarize(&session, &config.fact_table)
        })
        .await?;
        tracing::info!(
            run = %ctx.run_id,
            total = summary.total,
            mean_utilidad = ?summary.mean_utilidad,
            max_utilidad = ?summary.max_utilidad,
            "fact summary\n{summary}"
        );
        Ok(())
    }
}

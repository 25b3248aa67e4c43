use async_trait::async_trait;
use eltflow_utils::EltResult;

use crate::store::warehouse::Session;
use crate::tasks::helpers::run_blocking;
use crate::tasks::traits::{Task, TaskContext};
use crate::tasks::RESET_TABLES;

/// Drops the staging and fact tables left by earlier runs. Absent tables are
/// fine, so every run starts from a clean warehouse.
pub struct ResetTables;

#[async_trait]
impl Task for ResetTables {
    fn name(&self) -> &str { RESET_TABLES }

    async fn run(&self, ctx: &TaskContext) -> EltResult<()> {
        let config = ctx.config.clone();
        run_blocking(move || {
            let session = Session::open(&config.warehouse_path)?;
            session.drop_table_if_exists(&config.staging_table)?;
            session.drop_table_if_exists(&config.fact_table)?;
            Ok(())
        })
        .await?;
        tracing::info!(
            run = %ctx.run_id,
            staging = %ctx.config.staging_table,
            fact = %ctx.config.fact_table,
            "tables dropped"
        );
        Ok(())
    }
}

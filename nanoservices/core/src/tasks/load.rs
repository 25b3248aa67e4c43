use async_trait::async_trait;
use eltflow_utils::EltResult;

use crate::destinations::table::TableDestination;
use crate::destinations::traits::Destination;
use crate::sources::csv_glob::CsvGlobSource;
use crate::sources::traits::Source;
use crate::tasks::traits::{Task, TaskContext};
use crate::tasks::LOAD_STAGING;

/// Loads every intake CSV into the staging table.
pub struct LoadStaging;

#[async_trait]
impl Task for LoadStaging {
    fn name(&self) -> &str { LOAD_STAGING }

    async fn run(&self, ctx: &TaskContext) -> EltResult<()> {
        let config = &ctx.config;
        let source = CsvGlobSource::new(&config.intake_glob, "staging").on_empty(config.on_empty);
        let destination = TableDestination::new(&config.warehouse_path, &config.staging_table, source.produces());

        let staging = source.extract().await?;
        let rows = destination.load(staging).await?;
        tracing::info!(run = %ctx.run_id, table = %config.staging_table, rows, "staging loaded");
        Ok(())
    }
}

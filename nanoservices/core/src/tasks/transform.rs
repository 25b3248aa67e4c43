use async_trait::async_trait;
use eltflow_utils::EltResult;
use std::collections::HashMap;

use crate::destinations::table::TableDestination;
use crate::destinations::traits::Destination;
use crate::sources::table::TableSource;
use crate::sources::traits::Source;
use crate::tasks::traits::{Task, TaskContext};
use crate::tasks::TRANSFORM_FACTS;
use crate::transforms::fact::FactTransform;
use crate::transforms::traits::Transform;

/// Rebuilds the fact table from staging.
pub struct BuildFacts;

#[async_trait]
impl Task for BuildFacts {
    fn name(&self) -> &str { TRANSFORM_FACTS }

    async fn run(&self, ctx: &TaskContext) -> EltResult<()> {
        let config = &ctx.config;
        let source = TableSource::new(&config.warehouse_path, &config.staging_table, "staging");
        let transform = FactTransform::new(source.produces(), "facts");
        let destination = TableDestination::new(&config.warehouse_path, &config.fact_table, transform.produces());

        let mut inputs = HashMap::new();
        inputs.insert(source.produces().to_string(), source.extract().await?);
        let facts = transform.transform(inputs).await?;
        let rows = destination.load(facts).await?;
        tracing::debug!(run = %ctx.run_id, table = %config.fact_table, rows, "fact table written");
        Ok(())
    }
}

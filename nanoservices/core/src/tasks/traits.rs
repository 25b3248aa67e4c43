use async_trait::async_trait;
use eltflow_utils::EltResult;
use std::sync::Arc;

use crate::config::types::RunConfig;

/// What a step sees while it runs.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub run_id: String,
    pub pipeline: String,
    pub attempt: u32,
    pub config: Arc<RunConfig>,
}

/// One unit of pipeline work. Implementations open whatever warehouse
/// session they need and release it before returning.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> EltResult<()>;
}

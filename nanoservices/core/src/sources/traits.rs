use async_trait::async_trait;
use eltflow_utils::{EltResult, Relation};

/// A data source that extracts a relation and declares what it produces.
#[async_trait]
pub trait Source: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// The named data output this source produces
    fn produces(&self) -> &str;

    /// Extract data from the source
    async fn extract(&self) -> EltResult<Relation>;
}

use async_trait::async_trait;
use eltflow_utils::{EltResult, Relation};
use std::path::PathBuf;

use crate::sources::traits::Source;
use crate::store::warehouse::Session;
use crate::tasks::helpers::run_blocking;

/// Reads a whole warehouse table. Opens its own session per extract.
#[derive(Debug, Clone)]
pub struct TableSource {
    warehouse: PathBuf,
    table: String,
    produces: String,
}

impl TableSource {
    pub fn new(warehouse: impl Into<PathBuf>, table: impl Into<String>, produces: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            table: table.into(),
            produces: produces.into(),
        }
    }
}

#[async_trait]
impl Source for TableSource {
    fn name(&self) -> &str { &self.table }
    fn produces(&self) -> &str { &self.produces }

    async fn extract(&self) -> EltResult<Relation> {
        let (path, table) = (self.warehouse.clone(), self.table.clone());
        run_blocking(move || Session::open(path)?.read_table(&table)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_back_a_stored_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dw.sqlite");
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![4, 5]))]).unwrap();
        Session::open(&path).unwrap().replace_table("staging_raw", &Relation::from_batch(batch)).unwrap();

        let source = TableSource::new(&path, "staging_raw", "staging");
        assert_eq!(source.name(), "staging_raw");
        let relation = source.extract().await.unwrap();
        assert_eq!(relation.num_rows(), 2);
    }

    #[tokio::test]
    async fn missing_table_is_an_error() {
        let dir = tempdir().unwrap();
        let source = TableSource::new(dir.path().join("dw.sqlite"), "nope", "staging");
        assert!(source.extract().await.is_err());
    }
}

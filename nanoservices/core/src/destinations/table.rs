use async_trait::async_trait;
use eltflow_utils::{EltResult, Relation};
use std::path::PathBuf;

use crate::destinations::traits::Destination;
use crate::store::warehouse::Session;
use crate::tasks::helpers::run_blocking;

/// Replaces a warehouse table with the loaded relation in one transaction.
#[derive(Debug, Clone)]
pub struct TableDestination {
    warehouse: PathBuf,
    table: String,
    consumes: String,
}

impl TableDestination {
    pub fn new(warehouse: impl Into<PathBuf>, table: impl Into<String>, consumes: impl Into<String>) -> Self {
        Self {
            warehouse: warehouse.into(),
            table: table.into(),
            consumes: consumes.into(),
        }
    }
}

#[async_trait]
impl Destination for TableDestination {
    fn name(&self) -> &str { &self.table }
    fn consumes(&self) -> &str { &self.consumes }

    async fn load(&self, relation: Relation) -> EltResult<usize> {
        let (path, table) = (self.warehouse.clone(), self.table.clone());
        run_blocking(move || {
            let mut session = Session::open(path)?;
            session.replace_table(&table, &relation)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn relation(ids: Vec<i64>) -> Relation {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("salario", DataType::Float64, true),
        ]));
        let salario = Float64Array::from(ids.iter().map(|i| *i as f64 * 100.0).collect::<Vec<_>>());
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(ids)), Arc::new(salario)]).unwrap();
        Relation::from_batch(batch)
    }

    #[tokio::test]
    async fn load_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dw.sqlite");
        let dest = TableDestination::new(&path, "fact_finanzas_elt", "facts");

        assert_eq!(dest.load(relation(vec![1, 2, 3])).await.unwrap(), 3);
        assert_eq!(dest.load(relation(vec![7])).await.unwrap(), 1);

        let session = Session::open(&path).unwrap();
        assert_eq!(session.count_rows("fact_finanzas_elt").unwrap(), 1);
    }
}

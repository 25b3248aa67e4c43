pub mod error;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use error::Error;
use std::sync::Arc;

pub type EltResult<T> = Result<T, Error>;

/// An in-memory relation: a schema plus zero or more record batches that all
/// share it. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct Relation {
    schema: SchemaRef,
    batches: Arc<Vec<RecordBatch>>,
}

impl Relation {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Relation { schema, batches: Arc::new(batches) }
    }

    pub fn empty(schema: SchemaRef) -> Self {
        Self::new(schema, Vec::new())
    }

    pub fn from_batch(batch: RecordBatch) -> Self {
        Self::new(batch.schema(), vec![batch])
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// Collapse all batches into one (an empty batch when there are none).
    pub fn concat(&self) -> EltResult<RecordBatch> {
        Ok(concat_batches(&self.schema, self.batches.iter())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]))
    }

    #[test]
    fn counts_rows_across_batches() {
        let a = RecordBatch::try_new(schema(), vec![Arc::new(Int64Array::from(vec![1, 2]))]).unwrap();
        let b = RecordBatch::try_new(schema(), vec![Arc::new(Int64Array::from(vec![3]))]).unwrap();
        let rel = Relation::new(schema(), vec![a, b]);
        assert_eq!(rel.num_rows(), 3);
        assert_eq!(rel.concat().unwrap().num_rows(), 3);
    }

    #[test]
    fn empty_relation_concats_to_empty_batch() {
        let rel = Relation::empty(schema());
        let batch = rel.concat().unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.schema().field(0).name(), "id");
    }
}

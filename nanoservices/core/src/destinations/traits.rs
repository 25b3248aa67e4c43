use async_trait::async_trait;
use eltflow_utils::{EltResult, Relation};

/// A data destination that loads a relation and declares what it consumes.
#[async_trait]
pub trait Destination: Send + Sync {
    fn name(&self) -> &str;

    /// The named data input this destination requires
    fn consumes(&self) -> &str;

    /// Load data to the destination, returning the number of rows written
    async fn load(&self, relation: Relation) -> EltResult<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingDestination {
        count: AtomicUsize,
    }

    #[async_trait]
    impl Destination for CountingDestination {
        fn name(&self) -> &str { "counter" }
        fn consumes(&self) -> &str { "facts" }
        async fn load(&self, relation: Relation) -> EltResult<usize> {
            let rows = relation.num_rows();
            self.count.fetch_add(rows, Ordering::SeqCst);
            Ok(rows)
        }
    }

    #[tokio::test]
    async fn destination_trait_works() {
        let dest = CountingDestination { count: AtomicUsize::new(0) };
        assert_eq!(dest.name(), "counter");
        assert_eq!(dest.consumes(), "facts");

        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();

        assert_eq!(dest.load(Relation::from_batch(batch)).await.unwrap(), 3);
        assert_eq!(dest.count.load(Ordering::SeqCst), 3);
    }
}

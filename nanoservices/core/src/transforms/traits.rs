use async_trait::async_trait;
use eltflow_utils::{EltResult, Relation};
use std::collections::HashMap;

/// A data transform that consumes one or more named inputs and produces one named output.
#[async_trait]
pub trait Transform: Send + Sync {
    fn name(&self) -> &str;

    /// Named inputs this transform requires
    fn consumes(&self) -> Vec<&str>;

    /// Named output this transform produces
    fn produces(&self) -> &str;

    async fn transform(&self, inputs: HashMap<String, Relation>) -> EltResult<Relation>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    struct Passthrough;

    #[async_trait]
    impl Transform for Passthrough {
        fn name(&self) -> &str { "passthrough" }
        fn consumes(&self) -> Vec<&str> { vec!["staging_raw"] }
        fn produces(&self) -> &str { "copy" }
        async fn transform(&self, mut inputs: HashMap<String, Relation>) -> EltResult<Relation> {
            Ok(inputs.remove("staging_raw").unwrap())
        }
    }

    #[tokio::test]
    async fn transform_trait_works() {
        let t = Passthrough;
        assert_eq!(t.consumes(), vec!["staging_raw"]);
        assert_eq!(t.produces(), "copy");

        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))]).unwrap();
        let mut inputs = HashMap::new();
        inputs.insert("staging_raw".to_string(), Relation::from_batch(batch));

        let result = t.transform(inputs).await.unwrap();
        assert_eq!(result.num_rows(), 3);
    }
}

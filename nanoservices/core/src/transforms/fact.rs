use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Date32Array, Float64Array, StringArray,
};
use arrow::compute::{cast, cast_with_options, filter_record_batch, CastOptions};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::row::{RowConverter, SortField};
use async_trait::async_trait;
use eltflow_utils::error::Error;
use eltflow_utils::{EltResult, Relation};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::transforms::dates::{normalize_date, to_epoch_days};
use crate::transforms::hashing::hash_email;
use crate::transforms::traits::Transform;

/// Row counts around the fact build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformStats {
    pub before: usize,
    pub after: usize,
    pub dropped: usize,
}

/// Schema of the fact table. `id` keeps whatever type staging inferred.
pub fn fact_schema(id_type: &DataType) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", id_type.clone(), true),
        Field::new("salario", DataType::Float64, true),
        Field::new("gastos", DataType::Float64, true),
        Field::new("fecha", DataType::Date32, true),
        Field::new("correo_hash", DataType::Utf8, true),
        Field::new("utilidad", DataType::Float64, true),
    ]))
}

/// Turn staging rows into validated, deduplicated fact rows.
///
/// Rules apply in order: date normalisation, expense defaulting, email
/// hashing, `utilidad = salario - gastos`, the validity filter, then
/// set-distinct over every output column (first occurrence wins).
pub fn build_facts(staging: &Relation) -> EltResult<(Relation, TransformStats)> {
    let batch = staging.concat()?;
    let rows = batch.num_rows();

    let id = required(&batch, "id")?;
    let salario = money(&required(&batch, "salario")?, "salario")?;

    let gastos = match batch.column_by_name("gastos") {
        Some(col) => money(col, "gastos")?,
        None => Float64Array::new_null(rows),
    };
    let gastos: Float64Array = gastos.iter().map(|g| Some(g.unwrap_or(0.0))).collect();

    let fecha: Date32Array = text(&required(&batch, "fecha")?)?
        .iter()
        .map(|raw| raw.and_then(normalize_date).map(to_epoch_days))
        .collect();

    let correo_hash: StringArray = match batch.column_by_name("correo") {
        Some(col) => text(col)?.iter().map(|email| email.map(hash_email)).collect(),
        None => StringArray::new_null(rows),
    };

    let utilidad: Float64Array = salario
        .iter()
        .zip(gastos.iter())
        .map(|(s, g)| Some(s? - g?))
        .collect();

    let keep: BooleanArray = (0..rows)
        .map(|i| {
            Some(
                id.is_valid(i)
                    && fecha.is_valid(i)
                    && salario.is_valid(i)
                    && salario.value(i) > 0.0
                    && gastos.value(i) >= 0.0,
            )
        })
        .collect();

    let schema = fact_schema(id.data_type());
    let facts = RecordBatch::try_new(
        schema.clone(),
        vec![
            id,
            Arc::new(salario),
            Arc::new(gastos),
            Arc::new(fecha),
            Arc::new(correo_hash),
            Arc::new(utilidad),
        ],
    )?;

    let valid = filter_record_batch(&facts, &keep)?;
    let distinct = distinct_rows(&valid)?;

    let stats = TransformStats {
        before: rows,
        after: distinct.num_rows(),
        dropped: rows - distinct.num_rows(),
    };
    Ok((Relation::new(schema, vec![distinct]), stats))
}

fn required(batch: &RecordBatch, name: &str) -> EltResult<ArrayRef> {
    batch
        .column_by_name(name)
        .cloned()
        .ok_or_else(|| Error::SchemaError(format!("staging relation has no '{name}' column")))
}

/// Strict numeric cast: a value that is not a number aborts the build.
fn money(col: &ArrayRef, name: &str) -> EltResult<Float64Array> {
    let options = CastOptions { safe: false, ..Default::default() };
    let cast = cast_with_options(col, &DataType::Float64, &options)
        .map_err(|e| Error::SchemaError(format!("column '{name}' is not numeric: {e}")))?;
    Ok(cast.as_primitive::<Float64Type>().clone())
}

fn text(col: &ArrayRef) -> EltResult<StringArray> {
    let cast = cast(col, &DataType::Utf8)?;
    Ok(cast.as_string::<i32>().clone())
}

fn distinct_rows(batch: &RecordBatch) -> EltResult<RecordBatch> {
    let fields = batch
        .schema()
        .fields()
        .iter()
        .map(|f| SortField::new(f.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let first_seen: BooleanArray = rows.iter().map(|row| Some(seen.insert(row))).collect();
    Ok(filter_record_batch(batch, &first_seen)?)
}

/// Builds the fact relation from the staging relation.
pub struct FactTransform {
    input_name: String,
    output_name: String,
}

impl FactTransform {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input_name: input.into(),
            output_name: output.into(),
        }
    }

    pub async fn run(&self, staging: Relation) -> EltResult<(Relation, TransformStats)> {
        let (facts, stats) = build_facts(&staging)?;
        tracing::info!(before = stats.before, "rows before transform");
        tracing::info!(after = stats.after, "rows after transform");
        tracing::info!(dropped = stats.dropped, "rows dropped by transform");
        crate::metrics::set_row_counts(stats.before, stats.after);
        Ok((facts, stats))
    }
}

#[async_trait]
impl Transform for FactTransform {
    fn name(&self) -> &str { "fact_transform" }
    fn consumes(&self) -> Vec<&str> { vec![&self.input_name] }
    fn produces(&self) -> &str { &self.output_name }

    async fn transform(&self, mut inputs: HashMap<String, Relation>) -> EltResult<Relation> {
        let staging = inputs.remove(&self.input_name).ok_or_else(|| {
            Error::TaskError(format!("input '{}' was not provided", self.input_name))
        })?;
        let (facts, _) = self.run(staging).await?;
        Ok(facts)
    }
}

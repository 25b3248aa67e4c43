use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder,
    StringBuilder,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Date32Type, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use eltflow_utils::error::Error;
use eltflow_utils::{EltResult, Relation};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, params_from_iter, Connection};
use std::path::Path;
use std::sync::Arc;

use crate::transforms::dates::{from_epoch_days, to_epoch_days};

/// One connection to the warehouse database. Each pipeline step opens its own
/// session and drops it before the next step starts.
pub struct Session {
    conn: Connection,
}

impl Session {
    pub fn open(path: impl AsRef<Path>) -> EltResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> EltResult<Self> {
        Ok(Self { conn: Connection::open_in_memory()? })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn drop_table_if_exists(&self, table: &str) -> EltResult<()> {
        self.conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> EltResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn count_rows(&self, table: &str) -> EltResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Drop `table` and recreate it from `relation` in one transaction, so
    /// readers see either the old table or the complete new one.
    pub fn replace_table(&mut self, table: &str, relation: &Relation) -> EltResult<usize> {
        let schema = relation.schema();
        if schema.fields().is_empty() {
            return Err(Error::SchemaError(format!("cannot create '{table}' without columns")));
        }

        let table_ident = quote_ident(table);
        let column_defs = schema
            .fields()
            .iter()
            .map(|f| format!("{} {}", quote_ident(f.name()), sql_type(f.data_type())))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=schema.fields().len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({column_defs});"
        ))?;

        let mut written = 0;
        {
            let mut stmt = tx.prepare(&format!("INSERT INTO {table_ident} VALUES ({placeholders})"))?;
            for batch in relation.batches() {
                let columns = batch
                    .columns()
                    .iter()
                    .map(storage_array)
                    .collect::<EltResult<Vec<_>>>()?;
                for row in 0..batch.num_rows() {
                    let values = columns
                        .iter()
                        .map(|col| cell(col, row))
                        .collect::<EltResult<Vec<_>>>()?;
                    stmt.execute(params_from_iter(values))?;
                    written += 1;
                }
            }
        }
        tx.commit()?;
        Ok(written)
    }

    /// Read a whole table back into a single-batch relation, typed from the
    /// declared column types.
    pub fn read_table(&self, table: &str) -> EltResult<Relation> {
        let columns = self.columns(table)?;
        if columns.is_empty() {
            return Err(Error::SchemaError(format!("table '{table}' does not exist")));
        }

        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|(name, dt)| Field::new(name, dt.clone(), true))
                .collect::<Vec<_>>(),
        ));
        let mut builders: Vec<ColumnBuilder> = columns
            .iter()
            .map(|(name, dt)| ColumnBuilder::new(name, dt))
            .collect();

        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {}", quote_ident(table)))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, builder) in builders.iter_mut().enumerate() {
                builder.append(row.get_ref(i)?)?;
            }
        }

        let arrays: Vec<ArrayRef> = builders.into_iter().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        Ok(Relation::new(schema, vec![batch]))
    }

    fn columns(&self, table: &str) -> EltResult<Vec<(String, DataType)>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get(1)?;
            let declared: String = row.get(2)?;
            Ok((name, arrow_type(&declared)))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_type(dt: &DataType) -> &'static str {
    match dt {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => "BIGINT",
        DataType::Float16 | DataType::Float32 | DataType::Float64 => "DOUBLE",
        DataType::Boolean => "BOOLEAN",
        DataType::Date32 => "DATE",
        _ => "VARCHAR",
    }
}

fn arrow_type(declared: &str) -> DataType {
    match declared.to_ascii_uppercase().as_str() {
        "BIGINT" | "INTEGER" | "INT" => DataType::Int64,
        "DOUBLE" | "REAL" | "FLOAT" => DataType::Float64,
        "BOOLEAN" => DataType::Boolean,
        "DATE" => DataType::Date32,
        _ => DataType::Utf8,
    }
}

/// Cast a column to the Arrow type its SQL column type reads back as.
fn storage_array(col: &ArrayRef) -> EltResult<ArrayRef> {
    let target = arrow_type(sql_type(col.data_type()));
    if col.data_type() == &target {
        return Ok(col.clone());
    }
    Ok(cast(col, &target)?)
}

fn cell(col: &ArrayRef, row: usize) -> EltResult<Value> {
    if col.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match col.data_type() {
        DataType::Int64 => Value::Integer(col.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => Value::Real(col.as_primitive::<Float64Type>().value(row)),
        DataType::Boolean => Value::Integer(col.as_boolean().value(row) as i64),
        DataType::Date32 => {
            let days = col.as_primitive::<Date32Type>().value(row);
            match from_epoch_days(days) {
                Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                None => Value::Null,
            }
        }
        DataType::Utf8 => Value::Text(col.as_string::<i32>().value(row).to_string()),
        other => return Err(Error::SchemaError(format!("unsupported column type {other}"))),
    };
    Ok(value)
}

enum ColumnBuilder {
    Int(String, Int64Builder),
    Float(String, Float64Builder),
    Bool(String, BooleanBuilder),
    Date(String, Date32Builder),
    Text(String, StringBuilder),
}

impl ColumnBuilder {
    fn new(name: &str, dt: &DataType) -> Self {
        let name = name.to_string();
        match dt {
            DataType::Int64 => ColumnBuilder::Int(name, Int64Builder::new()),
            DataType::Float64 => ColumnBuilder::Float(name, Float64Builder::new()),
            DataType::Boolean => ColumnBuilder::Bool(name, BooleanBuilder::new()),
            DataType::Date32 => ColumnBuilder::Date(name, Date32Builder::new()),
            _ => ColumnBuilder::Text(name, StringBuilder::new()),
        }
    }

    fn append(&mut self, value: ValueRef<'_>) -> EltResult<()> {
        match (self, value) {
            (ColumnBuilder::Int(_, b), ValueRef::Null) => b.append_null(),
            (ColumnBuilder::Float(_, b), ValueRef::Null) => b.append_null(),
            (ColumnBuilder::Bool(_, b), ValueRef::Null) => b.append_null(),
            (ColumnBuilder::Date(_, b), ValueRef::Null) => b.append_null(),
            (ColumnBuilder::Text(_, b), ValueRef::Null) => b.append_null(),

            (ColumnBuilder::Int(_, b), ValueRef::Integer(i)) => b.append_value(i),
            (ColumnBuilder::Float(_, b), ValueRef::Integer(i)) => b.append_value(i as f64),
            (ColumnBuilder::Float(_, b), ValueRef::Real(f)) => b.append_value(f),
            (ColumnBuilder::Bool(_, b), ValueRef::Integer(i)) => b.append_value(i != 0),
            (ColumnBuilder::Date(name, b), ValueRef::Text(raw)) => {
                let raw = String::from_utf8_lossy(raw);
                let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                    Error::SchemaError(format!("column '{name}' holds a non-date value '{raw}'"))
                })?;
                b.append_value(to_epoch_days(date));
            }
            (ColumnBuilder::Text(_, b), ValueRef::Text(raw)) => {
                b.append_value(String::from_utf8_lossy(raw))
            }
            (ColumnBuilder::Text(_, b), ValueRef::Integer(i)) => b.append_value(i.to_string()),
            (ColumnBuilder::Text(_, b), ValueRef::Real(f)) => b.append_value(f.to_string()),

            (builder, other) => {
                return Err(Error::SchemaError(format!(
                    "column '{}' holds an unexpected {:?} value",
                    builder.name(),
                    other.data_type()
                )))
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        match self {
            ColumnBuilder::Int(n, _)
            | ColumnBuilder::Float(n, _)
            | ColumnBuilder::Bool(n, _)
            | ColumnBuilder::Date(n, _)
            | ColumnBuilder::Text(n, _) => n,
        }
    }

    fn finish(self) -> ArrayRef {
        match self {
            ColumnBuilder::Int(_, mut b) => Arc::new(b.finish()),
            ColumnBuilder::Float(_, mut b) => Arc::new(b.finish()),
            ColumnBuilder::Bool(_, mut b) => Arc::new(b.finish()),
            ColumnBuilder::Date(_, mut b) => Arc::new(b.finish()),
            ColumnBuilder::Text(_, mut b) => Arc::new(b.finish()),
        }
    }
}

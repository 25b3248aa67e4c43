use arrow::array::{new_null_array, ArrayRef};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use eltflow_utils::error::Error;
use eltflow_utils::{EltResult, Relation};
use globset::GlobBuilder;
use std::fs::File;
use std::io::Seek;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::config::types::EmptyIntake;
use crate::sources::traits::Source;
use crate::tasks::helpers::run_blocking;

/// Columns of the staging relation when no intake file is present.
pub fn canonical_staging_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, true),
        Field::new("salario", DataType::Float64, true),
        Field::new("gastos", DataType::Float64, true),
        Field::new("fecha", DataType::Utf8, true),
        Field::new("correo", DataType::Utf8, true),
    ]))
}

/// Reads every CSV file matching a glob into one staging relation.
#[derive(Debug, Clone)]
pub struct CsvGlobSource {
    pattern: String,
    produces: String,
    on_empty: EmptyIntake,
}

impl CsvGlobSource {
    pub fn new(pattern: impl Into<String>, produces: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            produces: produces.into(),
            on_empty: EmptyIntake::default(),
        }
    }

    pub fn on_empty(mut self, policy: EmptyIntake) -> Self {
        self.on_empty = policy;
        self
    }

    /// Synchronous load; `extract` runs this on the blocking pool.
    pub fn load(&self) -> EltResult<Relation> {
        let paths = expand_glob(&self.pattern)?;
        if paths.is_empty() {
            return match self.on_empty {
                EmptyIntake::Empty => {
                    tracing::warn!(pattern = %self.pattern, "no intake files matched");
                    Ok(Relation::empty(canonical_staging_schema()))
                }
                EmptyIntake::Fail => Err(Error::EmptyIntake(self.pattern.clone())),
            };
        }

        let files = paths
            .iter()
            .map(|path| read_csv(path))
            .collect::<EltResult<Vec<_>>>()?;
        let schema = merge_schemas(files.iter().map(|f| f.schema()));
        let mut batches = Vec::new();
        for file in &files {
            for batch in file.batches() {
                batches.push(align(batch, &schema)?);
            }
        }
        tracing::debug!(files = paths.len(), columns = schema.fields().len(), "intake read");
        Ok(Relation::new(schema, batches))
    }
}

#[async_trait]
impl Source for CsvGlobSource {
    fn name(&self) -> &str { "csv_glob" }
    fn produces(&self) -> &str { &self.produces }

    async fn extract(&self) -> EltResult<Relation> {
        let source = self.clone();
        run_blocking(move || source.load()).await
    }
}

/// Expand a glob into the sorted list of matching files. `**` descends into
/// subdirectories; other wildcards stay within one path segment. Symlinked
/// files and directories are followed.
pub fn expand_glob(pattern: &str) -> EltResult<Vec<PathBuf>> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()?
        .compile_matcher();

    let root = literal_root(pattern);
    if root.is_file() {
        return Ok(if matcher.is_match(&root) { vec![root] } else { Vec::new() });
    }
    let listing = if root.as_os_str().is_empty() { Path::new(".") } else { root.as_path() };
    if !listing.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(listing).follow_links(true).sort_by_file_name();
    if !pattern.contains("**") {
        let total = Path::new(pattern).components().count();
        walker = walker.max_depth(total.saturating_sub(root.components().count()));
    }

    let mut found = Vec::new();
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Relative patterns match relative paths, not `./`-prefixed ones
        let path = match entry.path().strip_prefix(".") {
            Ok(relative) if root.as_os_str().is_empty() => relative.to_path_buf(),
            _ => entry.path().to_path_buf(),
        };
        if matcher.is_match(&path) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// The leading components of a pattern that contain no wildcard.
fn literal_root(pattern: &str) -> PathBuf {
    let mut root = PathBuf::new();
    for component in Path::new(pattern).components() {
        if let Component::Normal(part) = component {
            if part.to_string_lossy().contains(['*', '?', '[', '{']) {
                break;
            }
        }
        root.push(component);
    }
    root
}

fn read_csv(path: &Path) -> EltResult<Relation> {
    let mut file = File::open(path)?;
    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(text_for_untyped(inferred));
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)?;
    let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
    tracing::debug!(path = %path.display(), rows = batches.iter().map(|b| b.num_rows()).sum::<usize>(), "csv read");
    Ok(Relation::new(schema, batches))
}

/// Keep inferred dates and timestamps as text. Date normalisation happens in
/// the fact transform.
fn text_for_untyped(schema: Schema) -> Schema {
    let fields = schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = match field.data_type() {
                DataType::Date32
                | DataType::Date64
                | DataType::Time32(_)
                | DataType::Time64(_)
                | DataType::Timestamp(_, _) => DataType::Utf8,
                other => other.clone(),
            };
            Field::new(field.name(), data_type, true)
        })
        .collect::<Vec<_>>();
    Schema::new(fields)
}

/// Union of the file schemas, columns in order of first appearance. A column
/// that is empty in every file becomes text.
fn merge_schemas(schemas: impl IntoIterator<Item = SchemaRef>) -> SchemaRef {
    let mut fields: Vec<Field> = Vec::new();
    for schema in schemas {
        for field in schema.fields() {
            match fields.iter_mut().find(|f| f.name() == field.name()) {
                Some(existing) => {
                    let widened = widen(existing.data_type(), field.data_type());
                    *existing = Field::new(field.name(), widened, true);
                }
                None => fields.push(Field::new(field.name(), field.data_type().clone(), true)),
            }
        }
    }
    let fields = fields
        .into_iter()
        .map(|field| match field.data_type() {
            DataType::Null => Field::new(field.name(), DataType::Utf8, true),
            _ => field,
        })
        .collect::<Vec<_>>();
    Arc::new(Schema::new(fields))
}

fn widen(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        (a, b) if a == b => a.clone(),
        (DataType::Null, other) | (other, DataType::Null) => other.clone(),
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => DataType::Float64,
        _ => DataType::Utf8,
    }
}

/// Cast a file's batch to the merged schema, filling absent columns with nulls.
fn align(batch: &RecordBatch, schema: &SchemaRef) -> EltResult<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(column) if column.data_type() == field.data_type() => Ok(column.clone()),
            Some(column) => cast(column, field.data_type()),
            None => Ok(new_null_array(field.data_type(), batch.num_rows())),
        })
        .collect::<Result<Vec<ArrayRef>, ArrowError>>()?;
    Ok(RecordBatch::try_new(schema.clone(), columns)?)
}

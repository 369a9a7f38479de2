use crate::errors::PipelineError;
use crate::transform::FlattenedRecord;
use arrow_array::builder::{Int64Builder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaBuilder};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

pub const RECORD_ID_COLUMN: &str = "_record_id";
pub const SYNC_TIMESTAMP_COLUMN: &str = "_sync_timestamp";
pub const TIMESTAMP_COLUMN_PREFIX: &str = "timestamp_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    System,
    Flattened,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl ColumnSpec {
    fn system(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::System,
            nullable: false,
        }
    }

    fn flattened(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::Flattened,
            nullable: true,
        }
    }

    fn timestamp(source: &str) -> Self {
        Self {
            name: format!("{TIMESTAMP_COLUMN_PREFIX}{source}"),
            kind: ColumnKind::Timestamp,
            nullable: true,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self.kind {
            ColumnKind::Timestamp => DataType::Int64,
            ColumnKind::System | ColumnKind::Flattened => DataType::Utf8,
        }
    }

    pub fn field(&self) -> Field {
        Field::new(&self.name, self.data_type(), self.nullable)
    }
}

/// The encoded batch: column descriptions in file order plus the Arrow data.
#[derive(Debug, Clone)]
pub struct ColumnSet {
    pub columns: Vec<ColumnSpec>,
    pub batch: RecordBatch,
    pub synced_at: DateTime<Utc>,
}

impl ColumnSet {
    pub fn row_count(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Transposes flattened rows into typed columns.
///
/// Columns come out as `_record_id`, `_sync_timestamp`, the flattened
/// columns sorted, then one `timestamp_<field>` per detected source, sorted.
/// A derived name that is already taken gets a numeric suffix.
/// A flattened column missing from a row is written as an empty string; a
/// missing detection in a timestamp column is written as null.
pub fn encode(
    records: &[FlattenedRecord],
    all_columns: &[String],
    timestamp_columns: &[String],
    synced_at: DateTime<Utc>,
) -> Result<ColumnSet, PipelineError> {
    let all_columns: BTreeSet<&str> = all_columns.iter().map(String::as_str).collect();
    let timestamp_columns: BTreeSet<&str> = timestamp_columns.iter().map(String::as_str).collect();

    let columns = column_specs(&all_columns, &timestamp_columns);
    let rows = records.len();
    let synced_at_text = synced_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    let mut record_id_values = StringBuilder::with_capacity(rows, rows * 16);
    let mut sync_timestamp_values = StringBuilder::with_capacity(rows, rows * synced_at_text.len());
    let mut flattened_values: Vec<StringBuilder> = all_columns
        .iter()
        .map(|_| StringBuilder::with_capacity(rows, rows * 8))
        .collect();
    let mut timestamp_values: Vec<Int64Builder> = timestamp_columns
        .iter()
        .map(|_| Int64Builder::with_capacity(rows))
        .collect();

    for record in records {
        record_id_values.append_value(&record.record_id);
        sync_timestamp_values.append_value(&synced_at_text);

        for (column, builder) in all_columns.iter().zip(flattened_values.iter_mut()) {
            match record.fields.get(*column) {
                None => builder.append_value(""),
                Some(value) => builder.append_option(value.to_column_string()),
            }
        }

        for (source, builder) in timestamp_columns.iter().zip(timestamp_values.iter_mut()) {
            builder.append_option(record.timestamp_fields.get(*source).copied());
        }
    }

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    arrays.push(Arc::new(record_id_values.finish()));
    arrays.push(Arc::new(sync_timestamp_values.finish()));
    arrays.extend(
        flattened_values
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef),
    );
    arrays.extend(
        timestamp_values
            .iter_mut()
            .map(|builder| Arc::new(builder.finish()) as ArrayRef),
    );

    let batch = RecordBatch::try_new(generate_schema(&columns), arrays)?;

    info!(
        "Encoded {} rows into {} columns ({} flattened, {} timestamp)",
        rows,
        columns.len(),
        all_columns.len(),
        timestamp_columns.len()
    );

    Ok(ColumnSet {
        columns,
        batch,
        synced_at,
    })
}

fn column_specs(all_columns: &BTreeSet<&str>, timestamp_columns: &BTreeSet<&str>) -> Vec<ColumnSpec> {
    let mut taken: HashSet<String> = HashSet::new();

    [ColumnSpec::system(RECORD_ID_COLUMN), ColumnSpec::system(SYNC_TIMESTAMP_COLUMN)]
        .into_iter()
        .chain(all_columns.iter().map(|name| ColumnSpec::flattened(name)))
        .chain(timestamp_columns.iter().map(|source| ColumnSpec::timestamp(source)))
        .map(|spec| claim_name(&mut taken, spec))
        .collect()
}

/// Renames `spec` to `<name>_<n>` when an earlier column already holds its name.
/// Flattened columns claim before derived ones, so source data keeps its name.
fn claim_name(taken: &mut HashSet<String>, mut spec: ColumnSpec) -> ColumnSpec {
    if !taken.contains(&spec.name) {
        taken.insert(spec.name.clone());
        return spec;
    }

    let renamed = (2..)
        .map(|n| format!("{}_{n}", spec.name))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_default();

    warn!(
        "Column {} already exists, writing {:?} column as {}",
        spec.name, spec.kind, renamed
    );

    spec.name = renamed;
    taken.insert(spec.name.clone());
    spec
}

fn generate_schema(columns: &[ColumnSpec]) -> Arc<Schema> {
    let mut builder = SchemaBuilder::new();

    for column in columns {
        builder.push(column.field());
    }

    Arc::new(builder.finish())
}

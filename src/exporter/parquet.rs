pub mod encoder;
pub mod metadata;

pub use encoder::{ColumnKind, ColumnSet, ColumnSpec, encode};
pub use metadata::{ColumnInfo, SchemaInfo, build_schema_info, display_name};

use crate::errors::PipelineError;
use crate::storage::ObjectStorage;
use chrono::SecondsFormat;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use tracing::{debug, error, info, warn};

pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";
pub const SCHEMA_CONTENT_TYPE: &str = "application/json";

/// Where one sync run of one object type is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub connection_id: String,
    pub object_type: String,
    pub sync_run_id: String,
}

impl Destination {
    pub fn new(
        connection_id: impl Into<String>,
        object_type: impl Into<String>,
        sync_run_id: impl Into<String>,
    ) -> Self {
        Self {
            connection_id: connection_id.into(),
            object_type: object_type.into(),
            sync_run_id: sync_run_id.into(),
        }
    }

    fn prefix(&self) -> String {
        format!("{}/{}/{}", self.connection_id, self.object_type, self.sync_run_id)
    }

    pub fn data_key(&self) -> String {
        format!("{}.parquet", self.prefix())
    }

    pub fn schema_key(&self) -> String {
        format!("{}.schema.json", self.prefix())
    }
}

fn key_value(key: &str, value: String) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(value),
    }
}

fn writer_properties(column_set: &ColumnSet, destination: &Destination) -> WriterProperties {
    let synced_at = column_set
        .synced_at
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let metadata = vec![
        key_value("connection_id", destination.connection_id.clone()),
        key_value("object_type", destination.object_type.clone()),
        key_value("synced_at", synced_at),
        key_value("record_count", column_set.row_count().to_string()),
    ];

    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(metadata))
        .build()
}

/// Serializes the column set as a Snappy-compressed Parquet file.
pub fn to_parquet_bytes(
    column_set: &ColumnSet,
    destination: &Destination,
) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Vec::<u8>::new();
    let mut writer = ArrowWriter::try_new(
        &mut buffer,
        column_set.batch.schema(),
        Some(writer_properties(column_set, destination)),
    )?;

    writer.write(&column_set.batch)?;
    writer.close()?;

    debug!("Parquet data written, buffer size: {} bytes", buffer.len());

    Ok(buffer)
}

/// Writes the Parquet object and its schema document.
///
/// Both objects are written or neither is: if the schema upload fails the
/// Parquet object is deleted again. A batch without rows writes nothing and
/// reports a zero-record schema.
pub async fn persist<S: ObjectStorage>(
    column_set: &ColumnSet,
    destination: &Destination,
    storage: &S,
) -> Result<SchemaInfo, PipelineError> {
    if column_set.row_count() == 0 {
        info!(
            "No records for {}/{}, skipping parquet export",
            destination.connection_id, destination.object_type
        );
        return Ok(SchemaInfo::empty(destination, column_set.synced_at));
    }

    let bytes = to_parquet_bytes(column_set, destination)?;
    let schema_info = build_schema_info(column_set, destination);
    let document = serde_json::to_vec_pretty(&schema_info)?;

    let data_key = destination.data_key();
    storage
        .put(&data_key, &bytes, Some(PARQUET_CONTENT_TYPE))
        .await
        .map_err(PipelineError::Upload)?;

    let schema_key = destination.schema_key();
    if let Err(e) = storage
        .put(&schema_key, &document, Some(SCHEMA_CONTENT_TYPE))
        .await
    {
        error!("Schema upload to {} failed, removing {}", schema_key, data_key);

        if let Err(delete_error) = storage.delete(&data_key).await {
            warn!("Could not remove {}: {:#}", data_key, delete_error);
        }

        return Err(PipelineError::Upload(e));
    }

    info!(
        "Parquet export completed successfully, exported {} rows to {}",
        schema_info.record_count, data_key
    );

    Ok(schema_info)
}

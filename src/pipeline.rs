use crate::config::TransformConfig;
use crate::errors::PipelineError;
use crate::exporter::parquet::{Destination, SchemaInfo, encode, persist};
use crate::storage::ObjectStorage;
use crate::transform::unify;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

/// Runs one batch through flatten → unify → encode → persist.
///
/// Either both the Parquet object and its schema document are stored, or an
/// error is returned and neither is left behind.
pub async fn sync_batch<S: ObjectStorage>(
    records: &[Value],
    config: &TransformConfig,
    destination: &Destination,
    synced_at: DateTime<Utc>,
    storage: &S,
) -> Result<SchemaInfo, PipelineError> {
    info!(
        "Starting sync of {} {} records for connection {}",
        records.len(),
        destination.object_type,
        destination.connection_id
    );

    let column_set = {
        let unified = unify(records, config)?;
        encode(
            &unified.records,
            &unified.all_columns,
            &unified.timestamp_columns,
            synced_at,
        )?
    };

    persist(&column_set, destination, storage).await
}

use crate::{
    AppState,
    errors::ApplicationError,
    exporter::parquet::Destination,
    metrics::{Outcome, SyncMetrics},
    pipeline::sync_batch,
    storage::ObjectStorage,
    utilities::generate_sync_run_id,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use anyhow::anyhow;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{Instrument, info_span};

#[derive(Debug, Deserialize)]
struct BatchRequest {
    platform: String,
    records: Vec<Value>,
}

/// Object names are built from these, so only plain identifiers are allowed.
fn valid_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

pub async fn post_batch<S: ObjectStorage + 'static>(
    State(state): State<AppState<S>>,
    Path((connection_id, object_type)): Path<(String, String)>,
    payload: String,
) -> Result<impl IntoResponse, ApplicationError> {
    if !valid_path_segment(&connection_id) || !valid_path_segment(&object_type) {
        return Err(ApplicationError::InvalidPayload(
            "connection id and object type must be plain identifiers".to_string(),
        ));
    }

    let json_payload: Value = serde_json::from_str(&payload)
        .map_err(|e| ApplicationError::InvalidPayload(e.to_string()))?;

    state
        .validator
        .validate(&json_payload)
        .map_err(|e| ApplicationError::InvalidPayload(e.to_string()))?;

    let request: BatchRequest = serde_json::from_value(json_payload)
        .map_err(|e| ApplicationError::InvalidPayload(e.to_string()))?;

    let (platform, config) = state.transform_configs.resolve(&request.platform);
    let synced_at = Utc::now();
    let destination = Destination::new(
        connection_id,
        object_type,
        generate_sync_run_id(synced_at),
    );

    let span = info_span!(
        "sync_batch",
        platform = %request.platform,
        transform_config = %platform,
        connection_id = %destination.connection_id,
        object_type = %destination.object_type,
        sync_run_id = %destination.sync_run_id,
    );

    // detached so a dropped connection cannot stop a batch between its two uploads
    let batch = {
        let storage = state.storage.clone();
        let config = config.clone();
        let destination = destination.clone();
        async move {
            sync_batch(
                &request.records,
                &config,
                &destination,
                synced_at,
                storage.as_ref(),
            )
            .await
        }
    };

    let result = match tokio::spawn(batch.instrument(span)).await {
        Ok(result) => result.map_err(ApplicationError::from),
        Err(e) => Err(ApplicationError::Internal(anyhow!("batch task failed: {e}"))),
    };

    match result {
        Ok(schema_info) => {
            let outcome = match schema_info.record_count {
                0 => Outcome::Empty,
                _ => Outcome::Success,
            };
            state.metrics.record_batch(
                platform,
                &destination.object_type,
                outcome,
                schema_info.record_count,
            );

            Ok((StatusCode::CREATED, Json(schema_info)))
        }
        Err(e) => {
            state.metrics.record_batch(
                platform,
                &destination.object_type,
                Outcome::Failure,
                0,
            );

            Err(e)
        }
    }
}

pub async fn get_metrics(
    State(metrics): State<Arc<SyncMetrics>>,
) -> Result<impl IntoResponse, ApplicationError> {
    Ok((StatusCode::OK, metrics.encode()?))
}

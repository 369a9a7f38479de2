pub mod config;
pub mod errors;
pub mod exporter;
pub mod metrics;
pub mod middleware;
pub mod pipeline;
pub mod responses;
pub mod schemas;
pub mod storage;
pub mod transform;
pub mod utilities;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use config::TransformConfigs;
use metrics::SyncMetrics;
use middleware::{BodyLimit, validate_body_length, validate_content_type};
use responses::{get_metrics, post_batch};
use std::sync::Arc;
use storage::ObjectStorage;
use tokio::{net::TcpListener, sync::watch};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub struct AppState<S> {
    pub storage: Arc<S>,
    pub validator: Arc<jsonschema::Validator>,
    pub transform_configs: Arc<TransformConfigs>,
    pub metrics: Arc<SyncMetrics>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            validator: self.validator.clone(),
            transform_configs: self.transform_configs.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

pub fn router<S: ObjectStorage + 'static>(state: AppState<S>, body_limit: usize) -> Router {
    Router::new()
        .route(
            "/connections/{connection_id}/objects/{object_type}/batches",
            post(post_batch::<S>),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(from_fn(validate_content_type))
                .layer(from_fn_with_state(
                    BodyLimit(body_limit),
                    validate_body_length,
                ))
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
        // registered after the layers so healthchecks skip validation and request logging
        .route("/healthcheck", get(StatusCode::OK))
}

pub fn metrics_router(metrics: Arc<SyncMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(get_metrics))
        .with_state(metrics)
        .layer(TraceLayer::new_for_http())
}

/// Serves `app` until `shutdown` flips to true, then stops accepting
/// connections and waits for in-flight requests to finish.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            // a dropped sender also ends the wait
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}

use anyhow::Result;
use axum::Router;
use crm_parquet_sync::{
    AppState,
    config::{ServerConfig, TransformConfigs},
    metrics::SyncMetrics,
    metrics_router, router, serve,
    schemas::batch_validator,
    storage::google_storage::GoogleStorageClient,
    utilities::initialize_tracing,
};
use std::{path::Path, sync::Arc};
use tokio::{net::TcpListener, select, signal::unix::SignalKind, sync::watch};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    initialize_tracing()?;

    let config = ServerConfig::from_env()?;
    let transform_configs =
        TransformConfigs::load(config.transform_config_path.as_deref().map(Path::new)).await?;
    let storage = GoogleStorageClient::new(&config.bucket, config.workload_identity.clone())?;
    let metrics = Arc::new(SyncMetrics::default());

    let state = AppState {
        storage: Arc::new(storage),
        validator: Arc::new(batch_validator()?),
        transform_configs: Arc::new(transform_configs),
        metrics: metrics.clone(),
    };

    let app = router(state, config.max_body_bytes);
    let metrics_app = metrics_router(metrics);

    let metrics_port = config.port.saturating_add(1);
    info!(
        "Listening on port {} (metrics on {}), writing to {}",
        config.port, metrics_port, config.bucket
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal = async move {
        shutdown_handler().await?;
        info!("Shutdown requested, draining in-flight batches");
        shutdown_tx.send_replace(true);
        Ok::<(), anyhow::Error>(())
    };

    tokio::try_join!(
        signal,
        server_handler(app, config.port, shutdown_rx.clone()),
        server_handler(metrics_app, metrics_port, shutdown_rx),
    )?;

    info!("Shut down cleanly");
    Ok(())
}

async fn server_handler(app: Router, port: u16, shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;

    serve(listener, app, shutdown).await.inspect_err(|e| {
        error!("Server on port {} exited: {:#}", port, e);
    })
}

async fn shutdown_handler() -> Result<()> {
    let mut terminate = tokio::signal::unix::signal(SignalKind::terminate())?;

    select! {
        _ = terminate.recv() => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    Ok(())
}

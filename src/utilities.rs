use chrono::{DateTime, Utc};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

pub fn get_environment_variable_with_default(name: &str, default: String) -> String {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default,
    }
}

/// Identifier of one sync run, sortable by time: `20240115T100000Z-<uuid>`.
pub fn generate_sync_run_id(synced_at: DateTime<Utc>) -> String {
    format!(
        "{}-{}",
        synced_at.format("%Y%m%dT%H%M%SZ"),
        Uuid::new_v4().simple()
    )
}

pub fn initialize_tracing() -> anyhow::Result<()> {
    let level = get_environment_variable_with_default("LOG_LEVEL", "info".to_string());
    let level = LevelFilter::from_str(&level).unwrap_or(LevelFilter::INFO);

    let target = tracing_subscriber::filter::Targets::new()
        .with_default(level)
        .with_target("hyper", LevelFilter::WARN)
        .with_target("hyper_util", LevelFilter::WARN)
        .with_target("reqwest", LevelFilter::WARN);

    let fmt: Box<dyn Layer<Registry> + Send + Sync> = tracing_subscriber::fmt::layer()
        .with_level(true)
        .with_filter(target)
        .boxed();

    tracing_subscriber::registry().with(vec![fmt]).try_init()?;

    Ok(())
}

use anyhow::Result;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue, text::encode},
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, EncodeLabelValue)]
pub enum Outcome {
    Success,
    Empty,
    Failure,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, EncodeLabelSet)]
pub struct BatchLabels {
    pub platform: String,
    pub object_type: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, EncodeLabelSet)]
pub struct RecordLabels {
    pub platform: String,
    pub object_type: String,
}

pub struct SyncMetrics {
    registry: Registry,
    batches: Family<BatchLabels, Counter>,
    records: Family<RecordLabels, Counter>,
}

impl Default for SyncMetrics {
    fn default() -> Self {
        let mut registry = Registry::with_prefix("crm_sync");
        let batches = Family::<BatchLabels, Counter>::default();
        let records = Family::<RecordLabels, Counter>::default();

        registry.register("batches", "Batches processed", batches.clone());
        registry.register("records", "Records written to parquet", records.clone());

        Self {
            registry,
            batches,
            records,
        }
    }
}

impl SyncMetrics {
    pub fn record_batch(&self, platform: &str, object_type: &str, outcome: Outcome, records: usize) {
        self.batches
            .get_or_create(&BatchLabels {
                platform: platform.to_string(),
                object_type: object_type.to_string(),
                outcome,
            })
            .inc();

        if records > 0 {
            self.records
                .get_or_create(&RecordLabels {
                    platform: platform.to_string(),
                    object_type: object_type.to_string(),
                })
                .inc_by(records as u64);
        }
    }

    pub fn encode(&self) -> Result<String> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

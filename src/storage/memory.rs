use super::ObjectStorage;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Default)]
struct Objects {
    stored: BTreeMap<String, (Vec<u8>, String)>,
    deleted: Vec<String>,
}

/// In-process object storage. Puts to names ending in `fail_suffix` are rejected.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<Objects>,
    fail_suffix: Option<String>,
}

impl MemoryStorage {
    pub fn failing_on(suffix: &str) -> Self {
        Self {
            fail_suffix: Some(suffix.to_string()),
            ..Default::default()
        }
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, object_name: &str) -> Option<(Vec<u8>, String)> {
        self.objects().stored.get(object_name).cloned()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects().stored.keys().cloned().collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.objects().deleted.clone()
    }

    pub fn len(&self) -> usize {
        self.objects().stored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().stored.is_empty()
    }
}

impl ObjectStorage for MemoryStorage {
    async fn put(&self, object_name: &str, data: &[u8], content_type: Option<&str>) -> Result<()> {
        if let Some(suffix) = &self.fail_suffix {
            if object_name.ends_with(suffix.as_str()) {
                return Err(anyhow!("simulated upload failure for {object_name}"));
            }
        }

        debug!("Storing {} bytes at {}", data.len(), object_name);

        self.objects().stored.insert(
            object_name.to_string(),
            (
                data.to_vec(),
                content_type.unwrap_or(DEFAULT_CONTENT_TYPE).to_string(),
            ),
        );
        Ok(())
    }

    async fn delete(&self, object_name: &str) -> Result<()> {
        let mut objects = self.objects();
        objects
            .stored
            .remove(object_name)
            .ok_or_else(|| anyhow!("no object named {object_name}"))?;
        objects.deleted.push(object_name.to_string());
        Ok(())
    }
}

pub mod google_storage;
pub mod memory;

use anyhow::Result;
use std::future::Future;

/// Destination for the Parquet objects and their schema documents.
/// Implementations are shared across concurrent batches.
pub trait ObjectStorage: Send + Sync {
    fn put(
        &self,
        object_name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, object_name: &str) -> impl Future<Output = Result<()>> + Send;
}

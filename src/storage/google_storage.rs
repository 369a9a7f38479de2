mod auth;

pub use auth::{AccessToken, TokenSource};

use super::ObjectStorage;
use crate::config::WorkloadIdentityConfig;
use anyhow::{Result, anyhow};
use reqwest::{Body, Client, Response};
use tracing::{debug, error, info};

const STORAGE_API: &str = "https://storage.googleapis.com";

pub struct GoogleStorageClient {
    token_source: TokenSource,
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

/// Splits `bucket/some/prefix` into the bucket name and an optional object prefix.
fn split_bucket(location: &str) -> (String, Option<String>) {
    let location = location.trim().trim_matches('/');

    match location.split_once('/') {
        None => (location.to_string(), None),
        Some((bucket, prefix)) => {
            let prefix = prefix.trim_matches('/');
            let prefix = (!prefix.is_empty()).then(|| prefix.to_string());
            (bucket.to_string(), prefix)
        }
    }
}

impl GoogleStorageClient {
    /// # Arguments
    /// * `location` - bucket name, optionally followed by `/prefix` for every object
    /// * `workload_identity` - federation settings used to obtain access tokens
    pub fn new(location: &str, workload_identity: WorkloadIdentityConfig) -> Result<Self> {
        if workload_identity.audience.is_none() {
            debug!("workload identity audience not configured");
            return Err(anyhow!(
                "cannot create storage client without a workload identity audience"
            ));
        }

        let (bucket, prefix) = split_bucket(location);
        if bucket.is_empty() {
            return Err(anyhow!("storage bucket must not be empty"));
        }

        let client = Client::new();

        Ok(Self {
            token_source: TokenSource::new(client.clone(), workload_identity),
            client,
            bucket,
            prefix,
        })
    }

    fn full_object_name(&self, object_name: &str) -> String {
        match &self.prefix {
            None => object_name.to_string(),
            Some(prefix) => format!("{prefix}/{object_name}"),
        }
    }

    async fn check_response(response: Response, operation: &str, object_name: &str) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(
            "{} of {} failed with status {}: {}",
            operation, object_name, status, error_text
        );

        Err(anyhow!(
            "{} of {} failed: {} - {}",
            operation,
            object_name,
            status,
            error_text
        ))
    }
}

impl ObjectStorage for GoogleStorageClient {
    async fn put(
        &self,
        object_name: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<()> {
        let content_type = content_type.unwrap_or("application/octet-stream");
        let object_name = self.full_object_name(object_name);

        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            STORAGE_API,
            self.bucket,
            urlencoding::encode(&object_name)
        );

        debug!(
            "Uploading to GCS: bucket={}, object={}, size={} bytes",
            self.bucket,
            object_name,
            data.len(),
        );

        let token = self.token_source.access_token().await?;
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .header("Content-Type", content_type)
            .header("Content-Length", data.len().to_string())
            .body(Body::from(data.to_vec()))
            .send()
            .await?;

        Self::check_response(response, "Upload", &object_name).await?;

        info!(
            "Successfully uploaded to GCS: bucket={}, object={}",
            self.bucket, object_name
        );
        Ok(())
    }

    async fn delete(&self, object_name: &str) -> Result<()> {
        let object_name = self.full_object_name(object_name);

        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            STORAGE_API,
            self.bucket,
            urlencoding::encode(&object_name)
        );

        let token = self.token_source.access_token().await?;
        let response = self.client.delete(&url).bearer_auth(token).send().await?;

        Self::check_response(response, "Delete", &object_name).await?;

        info!(
            "Deleted from GCS: bucket={}, object={}",
            self.bucket, object_name
        );
        Ok(())
    }
}

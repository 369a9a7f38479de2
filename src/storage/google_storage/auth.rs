//! Access tokens for Google Cloud Storage through Workload Identity Federation.
//!
//! The Kubernetes service account token mounted into the pod is exchanged at
//! Google's STS endpoint for a short-lived access token, which is cached until
//! five minutes before it expires.

use crate::config::WorkloadIdentityConfig;
use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::RwLock};
use tracing::{debug, error, info};

const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const REQUESTED_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const SUBJECT_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:jwt";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const REFRESH_MARGIN_SECONDS: i64 = 300;
const DEFAULT_LIFETIME_SECONDS: i64 = 3600;

#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    audience: &'a str,
    grant_type: &'a str,
    requested_token_type: &'a str,
    subject_token: &'a str,
    subject_token_type: &'a str,
    scope: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn from_response(response: TokenExchangeResponse, now: DateTime<Utc>) -> Self {
        let lifetime = response
            .expires_in
            .filter(|seconds| *seconds > 0)
            .unwrap_or(DEFAULT_LIFETIME_SECONDS);

        Self {
            token: response.access_token,
            expires_at: now + TimeDelta::seconds(lifetime),
        }
    }

    /// True once fewer than five minutes of validity remain.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(REFRESH_MARGIN_SECONDS) >= self.expires_at
    }
}

fn fresh_token(cached: Option<&AccessToken>) -> Option<String> {
    cached
        .filter(|token| !token.needs_refresh(Utc::now()))
        .map(|token| token.token.clone())
}

pub struct TokenSource {
    client: Client,
    config: WorkloadIdentityConfig,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenSource {
    pub fn new(client: Client, config: WorkloadIdentityConfig) -> Self {
        Self {
            client,
            config,
            cached: RwLock::new(None),
        }
    }

    /// A valid access token, exchanging a fresh one when the cached token is stale.
    ///
    /// Concurrent callers share one exchange: the first to find the token stale
    /// refreshes it while the others wait on the write lock.
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = fresh_token(self.cached.read().await.as_ref()) {
            debug!("Using cached access token");
            return Ok(token);
        }

        let mut cached = self.cached.write().await;
        if let Some(token) = fresh_token(cached.as_ref()) {
            return Ok(token);
        }

        let token = self.exchange().await?;
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn exchange(&self) -> Result<AccessToken> {
        info!("Exchanging Kubernetes service account token for Google Cloud access token");

        let audience = self
            .config
            .audience
            .as_deref()
            .ok_or_else(|| anyhow!("audience must be configured"))?;
        let subject_token = self.read_service_account_token().await?;

        let request = TokenExchangeRequest {
            audience,
            grant_type: GRANT_TYPE,
            requested_token_type: REQUESTED_TOKEN_TYPE,
            subject_token: &subject_token,
            subject_token_type: SUBJECT_TOKEN_TYPE,
            scope: STORAGE_SCOPE,
        };

        let response = self
            .client
            .post(&self.config.sts_endpoint)
            .form(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Token exchange failed with status {}: {}", status, error_text);
            return Err(anyhow!("Token exchange failed: {} - {}", status, error_text));
        }

        let token = AccessToken::from_response(response.json().await?, Utc::now());

        info!("Exchanged access token, valid until {}", token.expires_at);
        Ok(token)
    }

    async fn read_service_account_token(&self) -> Result<String> {
        let path = &self.config.service_account_token_path;

        let token = fs::read_to_string(path).await.map_err(|e| {
            error!("Failed to read service account token: {}", e);
            anyhow!("Failed to read service account token from {}: {}", path, e)
        })?;

        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("Service account token at {} is empty", path));
        }

        Ok(token.to_string())
    }
}

//! Generation provider client
//!
//! The provider accepts a generation request synchronously and delivers the
//! result later through the /callback endpoint. This module owns both the
//! submission call and the audio download that the reconciler performs when
//! a completion callback arrives.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const SUBMIT_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Provider client errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider returned code {0}: {1}")]
    Api(i64, String),

    #[error("Malformed provider response: {0}")]
    Parse(String),

    #[error("Audio download failed: {0}")]
    Download(String),
}

/// Seam between the correlator/reconciler and the generation provider.
///
/// Tests substitute an in-process fake; production uses [`SunoClient`].
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Submit a generation request; returns the provider-assigned task id
    async fn submit(&self, prompt: &str, title: &str) -> Result<String, ProviderError>;

    /// Download a completed audio asset from the provider-hosted URL
    async fn fetch_audio(&self, url: &str) -> Result<Bytes, ProviderError>;
}

/// Submission response envelope
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    code: i64,
    msg: Option<String>,
    data: Option<SubmitData>,
}

#[derive(Debug, Deserialize)]
struct SubmitData {
    #[serde(rename = "taskId")]
    task_id: String,
}

/// HTTP client for the Suno-style generation API
pub struct SunoClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    callback_url: String,
}

impl SunoClient {
    pub fn new(base_url: String, api_key: String, callback_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(SUBMIT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url,
            api_key,
            callback_url,
        }
    }
}

#[async_trait]
impl GenerationProvider for SunoClient {
    async fn submit(&self, prompt: &str, title: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/v1/generate", self.base_url);
        debug!("Submitting generation request: {}", url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "prompt": prompt,
                "title": title,
                "callBackUrl": self.callback_url,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if body.code != 200 {
            return Err(ProviderError::Api(
                body.code,
                body.msg.unwrap_or_else(|| "no message".to_string()),
            ));
        }

        body.data
            .map(|d| d.task_id)
            .ok_or_else(|| ProviderError::Parse("success response missing taskId".to_string()))
    }

    async fn fetch_audio(&self, url: &str) -> Result<Bytes, ProviderError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| ProviderError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| ProviderError::Download(e.to_string()))
    }
}

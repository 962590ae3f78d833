//! Title generation fallback chain
//!
//! Decorates generation requests with a display title. Sources are tried
//! in order (fine-tuned local model endpoint, then remote LLM API) and the
//! chain falls back to a static default; it never fails the request path.

use async_trait::async_trait;
use lofi_common::config::TitleConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Used when every source fails or none is configured
pub const DEFAULT_TITLE: &str = "Untitled Lo-Fi Beat";

const TITLE_TIMEOUT_SECS: u64 = 10;
const MAX_TITLE_LEN: usize = 150;

/// One stage of the fallback chain
#[async_trait]
pub trait TitleSource: Send + Sync {
    /// Human-readable source name for logging
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Ordered chain of title sources with a static default at the end
pub struct TitleChain {
    sources: Vec<Box<dyn TitleSource>>,
}

impl TitleChain {
    pub fn new(sources: Vec<Box<dyn TitleSource>>) -> Self {
        Self { sources }
    }

    /// Build the chain from configuration: local model first, remote LLM
    /// second. Unconfigured stages are skipped.
    pub fn from_config(config: &TitleConfig) -> Self {
        let mut sources: Vec<Box<dyn TitleSource>> = Vec::new();
        if let Some(endpoint) = &config.local_endpoint {
            sources.push(Box::new(LocalTitleModel::new(endpoint.clone())));
        }
        if let (Some(endpoint), Some(api_key)) = (&config.llm_endpoint, &config.llm_api_key) {
            sources.push(Box::new(RemoteLlmClient::new(
                endpoint.clone(),
                api_key.clone(),
            )));
        }
        Self::new(sources)
    }

    /// Generate a title for a prompt. Never errors: failed sources log and
    /// fall through to the next, ending at the static default.
    pub async fn generate(&self, prompt: &str) -> String {
        for source in &self.sources {
            match source.generate(prompt).await {
                Ok(raw) => {
                    if let Some(title) = clean_title(&raw) {
                        info!("Title generated by {}: {}", source.name(), title);
                        return title;
                    }
                    warn!("Title source {} returned an unusable title", source.name());
                }
                Err(e) => {
                    warn!("Title source {} failed: {}", source.name(), e);
                }
            }
        }
        DEFAULT_TITLE.to_string()
    }
}

/// Normalize a generated title; None when nothing usable remains
fn clean_title(raw: &str) -> Option<String> {
    let mut title = raw.trim().trim_matches('"').trim().to_string();
    if title.is_empty() {
        return None;
    }
    if title.len() > MAX_TITLE_LEN {
        let mut cut = MAX_TITLE_LEN;
        while !title.is_char_boundary(cut) {
            cut -= 1;
        }
        title.truncate(cut);
    }
    Some(title)
}

#[derive(Debug, Deserialize)]
struct TitleResponse {
    title: String,
}

/// Warmed handle to the local inference endpoint
struct ModelHandle {
    http: reqwest::Client,
}

/// Fine-tuned local title model behind an HTTP inference endpoint.
///
/// The handle is lazily initialized on first use and cached; `invalidate`
/// drops it so the next call reconnects (e.g. after the sidecar reloads
/// its weights).
pub struct LocalTitleModel {
    endpoint: String,
    handle: RwLock<Option<Arc<ModelHandle>>>,
}

impl LocalTitleModel {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            handle: RwLock::new(None),
        }
    }

    async fn handle(&self) -> Arc<ModelHandle> {
        if let Some(handle) = self.handle.read().await.as_ref() {
            return Arc::clone(handle);
        }

        let mut slot = self.handle.write().await;
        // A concurrent caller may have initialized it while we waited
        if let Some(handle) = slot.as_ref() {
            return Arc::clone(handle);
        }

        info!("Initializing local title model handle: {}", self.endpoint);
        let handle = Arc::new(ModelHandle {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(TITLE_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        });
        *slot = Some(Arc::clone(&handle));
        handle
    }

    /// Drop the cached handle; the next generate call re-initializes it
    pub async fn invalidate(&self) {
        *self.handle.write().await = None;
    }
}

#[async_trait]
impl TitleSource for LocalTitleModel {
    fn name(&self) -> &'static str {
        "local-model"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let handle = self.handle().await;
        let response: TitleResponse = handle
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.title)
    }
}

/// Remote LLM API stage
pub struct RemoteLlmClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RemoteLlmClient {
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(TITLE_TIMEOUT_SECS))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl TitleSource for RemoteLlmClient {
    fn name(&self) -> &'static str {
        "remote-llm"
    }

    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let response: TitleResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "prompt": format!("Create a song title for: {}", prompt),
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.title)
    }
}

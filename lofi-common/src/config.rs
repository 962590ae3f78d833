//! Configuration loading and resolution
//!
//! Values resolve through a fixed priority order:
//! 1. Command-line argument (highest, passed in by the binary)
//! 2. Environment variable (`LOFI_*`, with `AWS_*` honored for storage)
//! 3. TOML config file
//! 4. Compiled default (where one exists)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default database file name (relative to the working directory)
pub const DEFAULT_DATABASE_PATH: &str = "lofi.db";

/// Default generation provider API base URL
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.sunoapi.org";

/// Raw TOML config file contents; every field optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub port: Option<u16>,
    pub database_path: Option<String>,
    pub aws_bucket_name: Option<String>,
    pub aws_region: Option<String>,
    pub provider_base_url: Option<String>,
    pub provider_api_key: Option<String>,
    pub callback_url: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub title_local_endpoint: Option<String>,
    pub title_llm_endpoint: Option<String>,
    pub title_llm_api_key: Option<String>,
}

impl TomlConfig {
    /// Load TOML config from a file, or an empty config when the path is
    /// absent or the file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read config failed: {}", e)))?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse config failed: {}", e)))?;
        info!("Loaded config file: {}", path.display());
        Ok(config)
    }
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
}

/// Generation provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    /// Publicly reachable URL of this service's /callback endpoint,
    /// handed to the provider at submission time.
    pub callback_url: String,
}

/// Title generation chain configuration; all stages optional
#[derive(Debug, Clone, Default)]
pub struct TitleConfig {
    pub local_endpoint: Option<String>,
    pub llm_endpoint: Option<String>,
    pub llm_api_key: Option<String>,
}

/// Fully resolved application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_path: PathBuf,
    pub storage: StorageConfig,
    pub provider: ProviderConfig,
    pub title: TitleConfig,
    pub cors_origins: Vec<String>,
}

/// CLI-supplied overrides (highest priority tier)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub port: Option<u16>,
    pub database_path: Option<PathBuf>,
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Resolve the full configuration from CLI overrides, environment
    /// variables, and an optional TOML file.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let toml = TomlConfig::load(cli.config_path.as_deref())?;

        let port = cli
            .port
            .or_else(|| env_var("LOFI_PORT").and_then(|v| v.parse().ok()))
            .or(toml.port)
            .unwrap_or(DEFAULT_PORT);

        let database_path = cli
            .database_path
            .clone()
            .or_else(|| env_var("LOFI_DATABASE_PATH").map(PathBuf::from))
            .or_else(|| toml.database_path.as_deref().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        let bucket = env_var("LOFI_AWS_BUCKET_NAME")
            .or_else(|| env_var("AWS_BUCKET_NAME"))
            .or(toml.aws_bucket_name)
            .ok_or_else(|| {
                Error::Config(
                    "S3 bucket not configured. Set AWS_BUCKET_NAME or add \
                     aws_bucket_name to the config file."
                        .to_string(),
                )
            })?;

        let region = env_var("LOFI_AWS_REGION")
            .or_else(|| env_var("AWS_REGION"))
            .or(toml.aws_region)
            .ok_or_else(|| {
                Error::Config(
                    "S3 region not configured. Set AWS_REGION or add \
                     aws_region to the config file."
                        .to_string(),
                )
            })?;

        let api_key = env_var("LOFI_PROVIDER_API_KEY")
            .or(toml.provider_api_key)
            .ok_or_else(|| {
                Error::Config(
                    "Generation provider API key not configured. Set \
                     LOFI_PROVIDER_API_KEY or add provider_api_key to the \
                     config file."
                        .to_string(),
                )
            })?;

        let base_url = env_var("LOFI_PROVIDER_BASE_URL")
            .or(toml.provider_base_url)
            .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string());

        let callback_url = env_var("LOFI_CALLBACK_URL")
            .or(toml.callback_url)
            .ok_or_else(|| {
                Error::Config(
                    "Callback URL not configured. Set LOFI_CALLBACK_URL to \
                     the publicly reachable /callback endpoint of this \
                     service."
                        .to_string(),
                )
            })?;

        let cors_origins = env_var("LOFI_CORS_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .or(toml.cors_origins)
            .unwrap_or_default();

        let title = TitleConfig {
            local_endpoint: env_var("LOFI_TITLE_LOCAL_ENDPOINT").or(toml.title_local_endpoint),
            llm_endpoint: env_var("LOFI_TITLE_LLM_ENDPOINT").or(toml.title_llm_endpoint),
            llm_api_key: env_var("LOFI_TITLE_LLM_API_KEY").or(toml.title_llm_api_key),
        };

        Ok(Self {
            port,
            database_path,
            storage: StorageConfig { bucket, region },
            provider: ProviderConfig {
                base_url,
                api_key,
                callback_url,
            },
            title,
            cors_origins,
        })
    }
}

//! lofi-api: AI lo-fi song generation backend
//!
//! Startup sequence: tracing, build banner, configuration resolution,
//! database initialization, collaborator construction, serve.

use anyhow::Result;
use aws_config::{BehaviorVersion, Region};
use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use lofi_api::{build_router, AppState};
use lofi_common::config::{AppConfig, CliOverrides};
use lofi_common::db::init_database;
use lofi_api::services::provider::SunoClient;
use lofi_api::services::storage::S3Storage;
use lofi_api::services::titler::TitleChain;

#[derive(Parser, Debug)]
#[command(name = "lofi-api", about = "AI lo-fi song generation backend")]
struct Args {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// SQLite database path (overrides config)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification logged immediately, before any config/db delays
    info!(
        "Starting lofi-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = AppConfig::resolve(&CliOverrides {
        config_path: args.config,
        port: args.port,
        database_path: args.database,
    })?;

    info!("Database path: {}", config.database_path.display());
    let pool = init_database(&config.database_path).await?;

    // Process-scoped collaborators, constructed once
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.storage.region.clone()))
        .load()
        .await;
    let storage = Arc::new(S3Storage::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.storage.bucket.clone(),
        config.storage.region.clone(),
    ));
    info!(
        "Object storage: s3://{} ({})",
        config.storage.bucket, config.storage.region
    );

    let provider = Arc::new(SunoClient::new(
        config.provider.base_url.clone(),
        config.provider.api_key.clone(),
        config.provider.callback_url.clone(),
    ));

    let titles = Arc::new(TitleChain::from_config(&config.title));

    let state = AppState::new(pool, provider, storage, titles);
    let mut app = build_router(state);

    // Credentialed CORS for the browser frontend
    if config.cors_origins.is_empty() {
        warn!("No CORS origins configured; browser clients will be refused");
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    info!("lofi-api listening on http://0.0.0.0:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}

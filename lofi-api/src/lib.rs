//! lofi-api library: AI lo-fi song generation backend
//!
//! Bridges synchronous generation requests to the provider's asynchronous
//! completion callbacks through a durable task store, materializes finished
//! audio into object storage, and serves private/public song libraries.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::provider::GenerationProvider;
use crate::services::storage::ObjectStorage;
use crate::services::titler::TitleChain;

/// Application state shared across HTTP handlers.
///
/// Collaborators are process-scoped singletons constructed once at startup
/// and held behind trait objects so tests can substitute in-process fakes.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool (task store, song catalog, users, sessions)
    pub db: SqlitePool,
    /// Generation provider (submission + audio download)
    pub provider: Arc<dyn GenerationProvider>,
    /// Durable object storage for materialized audio
    pub storage: Arc<dyn ObjectStorage>,
    /// Title generation fallback chain
    pub titles: Arc<TitleChain>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn GenerationProvider>,
        storage: Arc<dyn ObjectStorage>,
        titles: Arc<TitleChain>,
    ) -> Self {
        Self {
            db,
            provider,
            storage,
            titles,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/", get(api::root_status))
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .route("/generate", post(api::generate_song))
        .route("/callback", post(api::provider_callback))
        .route("/task_status/:task_id", get(api::get_task_status))
        .route("/api/songs/private", get(api::private_songs))
        .route("/api/songs/public", get(api::public_songs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

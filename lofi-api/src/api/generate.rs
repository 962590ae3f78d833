//! Generation request endpoint (the correlator)
//!
//! Bridges the synchronous request to the asynchronous provider callback:
//! submit the prompt, persist a pending task owned by the requester, and
//! hand the task id back so the client can poll. The persisted task row is
//! what the callback path later correlates against.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::api::auth::SessionUser;
use crate::db::tasks;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    /// Free-text prompt
    pub q: Option<String>,
}

/// POST /generate?q=...
///
/// 401 without a session; 500 when the provider rejects the submission (no
/// task row is created); 200 with `{message, task_id, status}` on success.
pub async fn generate_song(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
    Query(params): Query<GenerateParams>,
) -> ApiResult<Json<Value>> {
    let prompt = params.q.unwrap_or_default();

    // Title decoration is best-effort; the chain never fails the request
    let title = state.titles.generate(&prompt).await;

    let task_id = match state.provider.submit(&prompt, &title).await {
        Ok(task_id) => task_id,
        Err(e) => {
            error!("Generation submission failed: {}", e);
            return Err(ApiError::Provider("Suno API error".to_string()));
        }
    };

    // Exactly one pending task row per successful submission
    tasks::insert_pending(&state.db, &task_id, user.id).await?;
    info!("Generation started: task {} for user {}", task_id, user.id);

    Ok(Json(json!({
        "message": "Generation started",
        "task_id": task_id,
        "status": "pending",
    })))
}

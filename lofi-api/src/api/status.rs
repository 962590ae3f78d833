//! Task status polling endpoint

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::services::reconciler;
use crate::AppState;

/// GET /task_status/:task_id
///
/// Read-only: `{task_id, status}` 200, or `{message}` 404 for an unknown
/// identifier. No side effects.
pub async fn get_task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = reconciler::task_status(&state.db, &task_id).await?;

    Ok(Json(json!({
        "task_id": task_id,
        "status": status.as_str(),
    })))
}

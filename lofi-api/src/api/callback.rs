//! Provider callback endpoint
//!
//! Thin adapter over the reconciler: recognized outcomes (Accepted,
//! Ignored) answer 200 so the provider stops retrying; Rejected answers
//! 400. Materialization failures propagate as 500, signaling a retry.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ApiResult;
use crate::services::reconciler::{self, CallbackPayload};
use crate::AppState;

/// POST /callback
pub async fn provider_callback(
    State(state): State<AppState>,
    Json(payload): Json<CallbackPayload>,
) -> ApiResult<Response> {
    let outcome = reconciler::handle_callback(
        &state.db,
        state.provider.as_ref(),
        state.storage.as_ref(),
        payload,
    )
    .await?;

    let status = if outcome.is_rejected() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    Ok((status, outcome.message()).into_response())
}

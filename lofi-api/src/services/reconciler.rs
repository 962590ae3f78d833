//! Callback reconciler
//!
//! Consumes provider callback payloads and drives the only state machine in
//! the system: task status `pending → complete` or `pending → error`. The
//! endpoint is stateless between invocations; everything flows through the
//! task and song tables, so correctness rests on idempotent, order-tolerant
//! handling of repeated and partial deliveries.
//!
//! Each gate below can short-circuit. Failures during materialization
//! (download, upload) leave the task `pending` so a provider retry can
//! re-attempt; the song_id idempotency check keeps retries from
//! double-inserting once the song row exists.

use lofi_common::db::TaskStatus;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::{songs, tasks};
use crate::error::{ApiError, ApiResult};
use crate::services::provider::GenerationProvider;
use crate::services::storage::{object_key, ObjectStorage};

/// Callback phase that signals final completion. Earlier phases (e.g.
/// "text", "first") are progress notifications and carry no asset we act on.
pub const TERMINAL_PHASE: &str = "complete";

/// Placeholder title when the provider payload omits one
pub const MISSING_TITLE_PLACEHOLDER: &str = "Song is missing title";

/// Provider callback payload. The shape is dictated by the provider and
/// must not be renegotiated; fields are optional so malformed deliveries
/// reach the gates below instead of failing JSON extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub code: Option<i64>,
    pub data: Option<CallbackData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackData {
    pub task_id: Option<String>,
    #[serde(rename = "callbackType")]
    pub callback_type: Option<String>,
    #[serde(default)]
    pub data: Vec<CallbackSong>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackSong {
    pub id: Option<String>,
    pub title: Option<String>,
    pub audio_url: Option<String>,
}

/// Outcome of one callback delivery.
///
/// `Accepted` and `Ignored` answer HTTP 200 so the provider stops
/// retrying; `Rejected` answers 400. The message is the plain-text
/// response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// State was mutated (task completed or errored)
    Accepted(&'static str),
    /// Deliberate no-op (duplicate, non-terminal phase, asset not ready)
    Ignored(&'static str),
    /// Malformed or unknown correlation; provider gets a 400
    Rejected(&'static str),
}

impl CallbackOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CallbackOutcome::Accepted(msg)
            | CallbackOutcome::Ignored(msg)
            | CallbackOutcome::Rejected(msg) => msg,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, CallbackOutcome::Rejected(_))
    }
}

/// Process one provider callback delivery.
///
/// Network or storage failures surface as errors (HTTP 500) without any
/// task/song mutation, which signals the provider to retry the delivery.
pub async fn handle_callback(
    pool: &SqlitePool,
    provider: &dyn GenerationProvider,
    storage: &dyn ObjectStorage,
    payload: CallbackPayload,
) -> ApiResult<CallbackOutcome> {
    // Gate 1: correlation key
    let Some(data) = payload.data.as_ref() else {
        warn!("Callback missing data envelope");
        return Ok(CallbackOutcome::Rejected("Missing task_id"));
    };
    let Some(task_id) = data.task_id.clone() else {
        warn!("Callback missing task_id");
        return Ok(CallbackOutcome::Rejected("Missing task_id"));
    };

    // Gate 2: only the terminal phase triggers work. A payload without a
    // callbackType is treated as final, matching deliveries that omit it.
    if let Some(phase) = data.callback_type.as_deref() {
        if phase != TERMINAL_PHASE {
            debug!("Ignoring non-terminal callback phase '{}' for task {}", phase, task_id);
            return Ok(CallbackOutcome::Ignored("Callback received"));
        }
    }

    // Gate 3: unknown task. Either a forged payload or a correlation this
    // store never held (the failure mode of the old in-memory map)
    let Some(task) = tasks::get_task(pool, &task_id).await? else {
        warn!("Unknown task_id in callback: {}", task_id);
        return Ok(CallbackOutcome::Rejected("Unknown task"));
    };

    // Gate 4: duplicate delivery for an already-settled task
    if task.status.is_terminal() {
        info!("Callback for task {} already in state {}", task_id, task.status.as_str());
        return Ok(CallbackOutcome::Ignored("Already processed"));
    }

    // Gate 5: provider-side failure
    if payload.code != Some(200) {
        tasks::mark_error(pool, &task_id).await?;
        info!("Task {} marked error (provider code {:?})", task_id, payload.code);
        return Ok(CallbackOutcome::Accepted("Callback processed"));
    }

    // Gate 6: first song entry only; later entries are discarded
    if data.data.len() > 1 {
        debug!("Callback for task {} carries {} songs; using index 0", task_id, data.data.len());
    }
    let Some(song) = data.data.first() else {
        warn!("Terminal callback for task {} has no songs; leaving pending", task_id);
        return Ok(CallbackOutcome::Ignored("Audio not ready"));
    };

    let title = song
        .title
        .clone()
        .unwrap_or_else(|| MISSING_TITLE_PLACEHOLDER.to_string());

    // A terminal callback without a downloadable asset is deferred, not
    // errored: the task stays pending awaiting a later delivery. This can
    // leave a task pending forever if no such delivery arrives.
    let Some(audio_url) = song.audio_url.as_deref() else {
        warn!("Skipping missing audio_url for song: {}", title);
        return Ok(CallbackOutcome::Ignored("Audio not ready"));
    };

    // The provider song id is the idempotency key; without it duplicates
    // cannot be recognized, so the delivery is rejected for retry.
    let Some(song_id) = song.id.as_deref() else {
        warn!("Terminal callback for task {} missing song id", task_id);
        return Ok(CallbackOutcome::Rejected("Missing song id"));
    };

    // Gate 7: already materialized. Still ensure the task is marked
    // complete, covering a crash between the song insert committing and
    // the status transition being observed.
    if songs::find_by_song_id(pool, song_id).await?.is_some() {
        info!("Callback already processed for song: {}", song_id);
        tasks::mark_complete(pool, &task_id).await?;
        return Ok(CallbackOutcome::Ignored("Already processed"));
    }

    // Gate 8: download. Failure leaves the task pending and answers 500 so
    // the provider retries the whole callback.
    let bytes = provider
        .fetch_audio(audio_url)
        .await
        .map_err(|e| ApiError::Internal(format!("Audio download failed: {}", e)))?;

    // Gates 9-10: durable upload under a collision-resistant key
    let key = object_key(&title);
    storage
        .upload(&key, bytes, "audio/mpeg")
        .await
        .map_err(|e| ApiError::Internal(format!("Storage upload failed: {}", e)))?;
    let stored_url = storage.public_url(&key);

    // Gate 11: song insert and task transition commit together
    tasks::complete_with_song(
        pool,
        &task_id,
        &tasks::NewSong {
            title,
            audio_url: stored_url,
            song_id: song_id.to_string(),
            user_id: Some(task.user_id),
        },
    )
    .await?;

    info!("Task {} complete; song {} materialized", task_id, song_id);
    Ok(CallbackOutcome::Accepted("Callback processed"))
}

/// Read-side of the correlation: status polling by task id
pub async fn task_status(pool: &SqlitePool, task_id: &str) -> ApiResult<TaskStatus> {
    match tasks::get_task(pool, task_id).await? {
        Some(task) => Ok(task.status),
        None => Err(ApiError::NotFound("Unknown task".to_string())),
    }
}

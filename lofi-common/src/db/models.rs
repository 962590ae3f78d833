//! Shared row models for the lofi database

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Account row. Password is stored and compared verbatim; this mirrors the
/// existing external contract and is intentionally not upgraded here.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password: String,
}

/// Lifecycle status of a generation task.
///
/// `Pending` is the only non-terminal state. Transitions go pending →
/// complete or pending → error, exactly once; terminal states are never
/// left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "complete" => Ok(TaskStatus::Complete),
            "error" => Ok(TaskStatus::Error),
            other => Err(Error::Internal(format!("Unknown task status: {}", other))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Complete | TaskStatus::Error)
    }
}

/// One song-generation request in flight (or finished).
///
/// Correlates the provider-assigned task identifier to the requesting user.
/// This row is the only synchronization point between the synchronous
/// request path and the asynchronous callback path.
#[derive(Debug, Clone)]
pub struct Task {
    /// Provider-assigned identifier, primary key
    pub task_id: String,
    /// Owning user, fixed at creation
    pub user_id: i64,
    pub status: TaskStatus,
}

/// Catalog row for a materialized song
#[derive(Debug, Clone)]
pub struct AiSong {
    pub id: i64,
    pub title: String,
    /// Durable object storage URL of the audio asset
    pub audio_url: String,
    /// Provider song identifier, the idempotency key for callbacks
    pub song_id: String,
    /// None ⇒ public song, visible to all callers
    pub user_id: Option<i64>,
}

//! Song library endpoints
//!
//! Pure reads projecting `{id, title, audio_url}`. No pagination; no
//! ordering guarantee beyond storage order.

use axum::{extract::State, Json};
use lofi_common::db::AiSong;
use serde::Serialize;

use crate::api::auth::SessionUser;
use crate::db::songs;
use crate::error::ApiResult;
use crate::AppState;

/// Library projection of a song row
#[derive(Debug, Serialize)]
pub struct SongView {
    pub id: i64,
    pub title: String,
    pub audio_url: String,
}

impl From<AiSong> for SongView {
    fn from(song: AiSong) -> Self {
        Self {
            id: song.id,
            title: song.title,
            audio_url: song.audio_url,
        }
    }
}

/// GET /api/songs/private: songs owned by the session user
pub async fn private_songs(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> ApiResult<Json<Vec<SongView>>> {
    let songs = songs::list_for_user(&state.db, user.id).await?;
    Ok(Json(songs.into_iter().map(SongView::from).collect()))
}

/// GET /api/songs/public: unowned songs, visible to all callers
pub async fn public_songs(State(state): State<AppState>) -> ApiResult<Json<Vec<SongView>>> {
    let songs = songs::list_public(&state.db).await?;
    Ok(Json(songs.into_iter().map(SongView::from).collect()))
}

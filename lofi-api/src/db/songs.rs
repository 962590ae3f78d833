//! Song catalog database operations
//!
//! Rows are created once by the callback reconciler (see
//! `crate::db::tasks::complete_with_song`) and never mutated afterwards.

use lofi_common::db::AiSong;
use lofi_common::Result;
use sqlx::{Row, SqlitePool};

fn song_from_row(row: &sqlx::sqlite::SqliteRow) -> AiSong {
    AiSong {
        id: row.get("id"),
        title: row.get("title"),
        audio_url: row.get("audio_url"),
        song_id: row.get("song_id"),
        user_id: row.get("user_id"),
    }
}

/// Idempotency lookup: has this provider song already been materialized?
pub async fn find_by_song_id(pool: &SqlitePool, song_id: &str) -> Result<Option<AiSong>> {
    let row = sqlx::query(
        "SELECT id, title, audio_url, song_id, user_id FROM ai_songs WHERE song_id = ?",
    )
    .bind(song_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(song_from_row))
}

/// Private library: songs owned by `user_id`
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<AiSong>> {
    let rows = sqlx::query(
        "SELECT id, title, audio_url, song_id, user_id FROM ai_songs WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(song_from_row).collect())
}

/// Public library: songs with no owner
pub async fn list_public(pool: &SqlitePool) -> Result<Vec<AiSong>> {
    let rows = sqlx::query(
        "SELECT id, title, audio_url, song_id, user_id FROM ai_songs WHERE user_id IS NULL",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(song_from_row).collect())
}

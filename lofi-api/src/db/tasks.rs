//! Task store database operations
//!
//! Durable mapping from provider task id to owning user and lifecycle
//! status. This replaces the in-memory task→user dictionary the design
//! evolved from: correlations survive restarts and duplicate callbacks can
//! be recognized by looking at the persisted status.
//!
//! Status transitions are guarded in SQL (`WHERE status = 'pending'`) so
//! concurrent deliveries for the same task serialize through the database
//! rather than an application lock.

use lofi_common::db::{Task, TaskStatus};
use lofi_common::Result;
use sqlx::{Row, SqlitePool};

/// Persist a new pending task owned by `user_id`
pub async fn insert_pending(pool: &SqlitePool, task_id: &str, user_id: i64) -> Result<()> {
    sqlx::query("INSERT INTO tasks (task_id, user_id, status) VALUES (?, ?, 'pending')")
        .bind(task_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Keyed lookup by provider task id
pub async fn get_task(pool: &SqlitePool, task_id: &str) -> Result<Option<Task>> {
    let row = sqlx::query("SELECT task_id, user_id, status FROM tasks WHERE task_id = ?")
        .bind(task_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let status: String = row.get("status");
            Ok(Some(Task {
                task_id: row.get("task_id"),
                user_id: row.get("user_id"),
                status: TaskStatus::parse(&status)?,
            }))
        }
        None => Ok(None),
    }
}

/// Transition a pending task to `error`. Returns false if the task was not
/// pending (already terminal), in which case nothing changed.
pub async fn mark_error(pool: &SqlitePool, task_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'error', updated_at = CURRENT_TIMESTAMP \
         WHERE task_id = ? AND status = 'pending'",
    )
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Transition a pending task to `complete` without inserting a song.
///
/// Used when the song row already exists (a prior attempt crashed between
/// the song insert committing and a caller observing it). Returns false if
/// the task was not pending.
pub async fn mark_complete(pool: &SqlitePool, task_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE tasks SET status = 'complete', updated_at = CURRENT_TIMESTAMP \
         WHERE task_id = ? AND status = 'pending'",
    )
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Fields for a song row about to be materialized
#[derive(Debug, Clone)]
pub struct NewSong {
    pub title: String,
    pub audio_url: String,
    pub song_id: String,
    pub user_id: Option<i64>,
}

/// Insert the song row and mark the task complete in one transaction.
///
/// Either both writes commit or neither does: no state exists where a song
/// row is visible while its task is still pending, or the reverse. A unique
/// violation on `song_id` (concurrent duplicate delivery) rolls back both.
pub async fn complete_with_song(pool: &SqlitePool, task_id: &str, song: &NewSong) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO ai_songs (title, audio_url, song_id, user_id) VALUES (?, ?, ?, ?)")
        .bind(&song.title)
        .bind(&song.audio_url)
        .bind(&song.song_id)
        .bind(song.user_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE tasks SET status = 'complete', updated_at = CURRENT_TIMESTAMP \
         WHERE task_id = ? AND status = 'pending'",
    )
    .bind(task_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::create_user;
    use lofi_common::db::create_schema;

    async fn pool_with_user() -> (SqlitePool, i64) {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        create_schema(&pool).await.unwrap();
        let user_id = create_user(&pool, "alice", "pw").await.unwrap();
        (pool, user_id)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (pool, user_id) = pool_with_user().await;

        insert_pending(&pool, "T1", user_id).await.unwrap();
        let task = get_task(&pool, "T1").await.unwrap().expect("Task not found");
        assert_eq!(task.user_id, user_id);
        assert_eq!(task.status, TaskStatus::Pending);

        assert!(get_task(&pool, "T99").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transitions_are_guarded() {
        let (pool, user_id) = pool_with_user().await;
        insert_pending(&pool, "T1", user_id).await.unwrap();

        assert!(mark_error(&pool, "T1").await.unwrap());
        // Terminal state is never left
        assert!(!mark_complete(&pool, "T1").await.unwrap());
        assert!(!mark_error(&pool, "T1").await.unwrap());

        let task = get_task(&pool, "T1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Error);
    }

    #[tokio::test]
    async fn test_complete_with_song_is_atomic() {
        let (pool, user_id) = pool_with_user().await;
        insert_pending(&pool, "T1", user_id).await.unwrap();
        insert_pending(&pool, "T2", user_id).await.unwrap();

        let song = NewSong {
            title: "Rainy Focus".to_string(),
            audio_url: "https://bucket.s3.region.amazonaws.com/a.mp3".to_string(),
            song_id: "S1".to_string(),
            user_id: Some(user_id),
        };
        complete_with_song(&pool, "T1", &song).await.unwrap();

        let task = get_task(&pool, "T1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Complete);

        // Same song_id for another task: insert fails, transaction rolls
        // back, T2 stays pending
        let result = complete_with_song(&pool, "T2", &song).await;
        assert!(result.is_err());
        let task = get_task(&pool, "T2").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
    }
}

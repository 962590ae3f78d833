//! Session token database operations
//!
//! Sessions back the cookie-based identity gate. Tokens are random UUIDs
//! stored server-side, so a restart does not invalidate the lookup path the
//! way an in-memory session map would.

use lofi_common::db::User;
use lofi_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Create a session for a user, returning the opaque token
pub async fn create_session(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let session_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO sessions (session_id, user_id) VALUES (?, ?)")
        .bind(&session_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(session_id)
}

/// Resolve the user owning a session token, if any
pub async fn find_user_by_session(pool: &SqlitePool, session_id: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.username, u.password
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.session_id = ?
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        username: row.get("username"),
        password: row.get("password"),
    }))
}

/// Delete a session token (logout). Deleting an unknown token is a no-op.
pub async fn delete_session(pool: &SqlitePool, session_id: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

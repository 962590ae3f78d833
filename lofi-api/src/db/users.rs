//! User account database operations

use lofi_common::db::User;
use lofi_common::Result;
use sqlx::{Row, SqlitePool};

/// Insert a new user and return its id.
///
/// Callers are expected to check for an existing username first; a race on
/// the unique constraint still surfaces as a database error.
pub async fn create_user(pool: &SqlitePool, username: &str, password: &str) -> Result<i64> {
    let result = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(password)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

/// Look up a user by username
pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, username, password FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        username: row.get("username"),
        password: row.get("password"),
    }))
}

/// Look up a user by id
pub async fn get_user(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT id, username, password FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        id: row.get("id"),
        username: row.get("username"),
        password: row.get("password"),
    }))
}

//! Account endpoints and the session identity gate
//!
//! Passwords are stored and compared verbatim; this preserves the existing
//! external contract and is explicitly not upgraded here. Session tokens
//! are random UUIDs stored server-side in the sessions table and carried by
//! an HttpOnly cookie.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    response::{AppendHeaders, IntoResponse},
    routing::post,
    Json, Router,
};
use lofi_common::db::User;
use serde_json::{json, Value};
use tracing::info;

use crate::db::{sessions, users};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "session";

/// Resolved request identity.
///
/// Extraction fails with 401 `{"message":"Please log in"}` when no valid
/// session cookie accompanies the request; gated handlers just take this
/// as an argument.
pub struct SessionUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let token = parts
            .headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_token);

        let Some(token) = token else {
            return Err(ApiError::Unauthorized("Please log in".to_string()));
        };

        match sessions::find_user_by_session(&state.db, &token).await? {
            Some(user) => Ok(SessionUser(user)),
            None => Err(ApiError::Unauthorized("Please log in".to_string())),
        }
    }
}

/// Pull the session token out of a Cookie header value
fn session_token(header: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

fn set_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=None; Secure",
        SESSION_COOKIE, token
    )
}

fn clear_cookie() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=None; Secure; Max-Age=0",
        SESSION_COOKIE
    )
}

/// Pull username/password out of a JSON body, preserving the legacy status
/// codes: missing/invalid body is 500, missing fields are 400.
fn credentials(payload: Option<Json<Value>>) -> ApiResult<(String, String)> {
    let Some(Json(body)) = payload else {
        return Err(ApiError::Internal("invalid JSON".to_string()));
    };
    let username = body.get("username").and_then(Value::as_str);
    let password = body.get("password").and_then(Value::as_str);
    match (username, password) {
        (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => {
            Ok((u.to_string(), p.to_string()))
        }
        _ => Err(ApiError::BadRequest("Missing fields".to_string())),
    }
}

/// POST /signup
pub async fn create_account(
    State(state): State<AppState>,
    payload: Option<Json<Value>>,
) -> ApiResult<Json<Value>> {
    let (username, password) = credentials(payload)?;

    if users::find_by_username(&state.db, &username).await?.is_some() {
        return Err(ApiError::BadRequest("Username already exists".to_string()));
    }

    users::create_user(&state.db, &username, &password).await?;
    info!("Created account: {}", username);
    Ok(Json(json!({ "message": "User created successfully" })))
}

/// POST /login
pub async fn verify_identity(
    State(state): State<AppState>,
    payload: Option<Json<Value>>,
) -> ApiResult<impl IntoResponse> {
    let (username, password) = credentials(payload)?;

    let Some(user) = users::find_by_username(&state.db, &username).await? else {
        return Err(ApiError::BadRequest("Username doesn't exist".to_string()));
    };

    // Verbatim comparison, deliberately preserved
    if user.password != password {
        return Err(ApiError::BadRequest("Incorrect password".to_string()));
    }

    let token = sessions::create_session(&state.db, user.id).await?;
    info!("Login: {}", username);

    Ok((
        AppendHeaders([(header::SET_COOKIE, set_cookie(&token))]),
        Json(json!({ "message": "login successful" })),
    ))
}

/// POST /logout
pub async fn sign_out(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(session_token)
    {
        sessions::delete_session(&state.db, &token).await?;
    }

    Ok((
        AppendHeaders([(header::SET_COOKIE, clear_cookie())]),
        Json(json!({ "message": "logged out" })),
    ))
}

/// Build account routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(create_account))
        .route("/login", post(verify_identity))
        .route("/logout", post(sign_out))
}

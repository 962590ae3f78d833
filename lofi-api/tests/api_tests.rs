//! Integration tests for the lofi-api endpoints
//!
//! Drives the full router with in-process fakes for the generation
//! provider and object storage, covering the request path (correlator),
//! the callback path (reconciler), status polling, libraries, and the
//! session gate.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use lofi_api::services::provider::{GenerationProvider, ProviderError};
use lofi_api::services::storage::{ObjectStorage, StorageError};
use lofi_api::services::titler::TitleChain;
use lofi_api::{build_router, AppState};
use lofi_common::db::create_schema;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`

// =============================================================================
// Test doubles
// =============================================================================

struct MockProvider {
    task_id: String,
    fail_submit: bool,
    downloads: AtomicUsize,
}

impl MockProvider {
    fn returning(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            fail_submit: false,
            downloads: AtomicUsize::new(0),
        }
    }

    fn rejecting() -> Self {
        Self {
            task_id: String::new(),
            fail_submit: true,
            downloads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    async fn submit(&self, _prompt: &str, _title: &str) -> Result<String, ProviderError> {
        if self.fail_submit {
            Err(ProviderError::Api(503, "capacity exceeded".to_string()))
        } else {
            Ok(self.task_id.clone())
        }
    }

    async fn fetch_audio(&self, _url: &str) -> Result<Bytes, ProviderError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"mp3-bytes"))
    }
}

struct MemoryStorage {
    uploads: AtomicUsize,
}

impl MemoryStorage {
    fn new() -> Self {
        Self {
            uploads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        _key: &str,
        _bytes: Bytes,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://test-bucket.s3.us-east-1.amazonaws.com/{}", key)
    }
}

// =============================================================================
// Test helpers
// =============================================================================

async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    create_schema(&pool).await.expect("Failed to create schema");
    pool
}

async fn setup_app_with(provider: Arc<MockProvider>) -> (Router, SqlitePool) {
    let pool = test_pool().await;
    let state = AppState::new(
        pool.clone(),
        provider,
        Arc::new(MemoryStorage::new()),
        Arc::new(TitleChain::new(vec![])),
    );
    (build_router(state), pool)
}

async fn setup_app() -> (Router, SqlitePool) {
    setup_app_with(Arc::new(MockProvider::returning("T1"))).await
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn extract_text(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    String::from_utf8(bytes.to_vec()).expect("Should be UTF-8")
}

/// Sign up and log in a user, returning the session cookie value
async fn login_user(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/signup",
            json!({ "username": username, "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            json!({ "username": username, "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("Login should set a session cookie")
        .to_str()
        .unwrap();
    set_cookie
        .split(';')
        .next()
        .expect("Cookie should have a value")
        .to_string()
}

fn complete_callback(task_id: &str, song_id: &str) -> Value {
    json!({
        "code": 200,
        "data": {
            "task_id": task_id,
            "callbackType": "complete",
            "data": [{
                "id": song_id,
                "title": "Rainy Focus",
                "audio_url": "http://provider/a.mp3",
            }],
        },
    })
}

async fn generate(app: &Router, cookie: &str) -> Value {
    let request = Request::builder()
        .method("POST")
        .uri("/generate?q=rainy%20study%20beat")
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    extract_json(response.into_body()).await
}

// =============================================================================
// Root & health
// =============================================================================

#[tokio::test]
async fn test_root_status() {
    let (app, _pool) = setup_app().await;

    let response = app.oneshot(get_request("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "backend running");
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = setup_app().await;

    let response = app.oneshot(get_request("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "lofi-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Accounts & session gate
// =============================================================================

#[tokio::test]
async fn test_signup_rejects_duplicate_username() {
    let (app, _pool) = setup_app().await;

    let body = json!({ "username": "alice", "password": "pw" });
    let response = app
        .clone()
        .oneshot(json_request("POST", "/signup", body.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request("POST", "/signup", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Username already exists");
}

#[tokio::test]
async fn test_signup_missing_fields() {
    let (app, _pool) = setup_app().await;

    let response = app
        .oneshot(json_request("POST", "/signup", json!({ "username": "alice" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Missing fields");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (app, _pool) = setup_app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/signup",
            json!({ "username": "alice", "password": "pw" }),
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/login",
            json!({ "username": "alice", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Incorrect password");
}

#[tokio::test]
async fn test_login_unknown_username() {
    let (app, _pool) = setup_app().await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/login",
            json!({ "username": "ghost", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Username doesn't exist");
}

#[tokio::test]
async fn test_logout_invalidates_session() {
    let (app, _pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The old cookie no longer resolves a user
    let request = Request::builder()
        .method("GET")
        .uri("/api/songs/private")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Generation request path (Scenario A)
// =============================================================================

#[tokio::test]
async fn test_generate_requires_login() {
    let (app, pool) = setup_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/generate?q=rainy%20study%20beat")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Please log in");

    // No task row is created for an unauthenticated request
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_generate_persists_pending_task() {
    let (app, pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;

    let body = generate(&app, &cookie).await;
    assert_eq!(body["message"], "Generation started");
    assert_eq!(body["task_id"], "T1");
    assert_eq!(body["status"], "pending");

    let status: String = sqlx::query_scalar("SELECT status FROM tasks WHERE task_id = 'T1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "pending");

    // Status poll sees the same pending task
    let response = app.oneshot(get_request("/task_status/T1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["task_id"], "T1");
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn test_generate_provider_error_creates_no_task() {
    let (app, pool) = setup_app_with(Arc::new(MockProvider::rejecting())).await;
    let cookie = login_user(&app, "alice").await;

    let request = Request::builder()
        .method("POST")
        .uri("/generate?q=beat")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["message"], "Suno API error");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_task_status_unknown_task() {
    let (app, _pool) = setup_app().await;

    let response = app.oneshot(get_request("/task_status/T99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert!(body["message"].is_string());
}

// =============================================================================
// Callback path (Scenarios B-E)
// =============================================================================

#[tokio::test]
async fn test_callback_completes_task_and_materializes_song() {
    let (app, pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;
    generate(&app, &cookie).await;

    let response = app
        .clone()
        .oneshot(json_request("POST", "/callback", complete_callback("T1", "S1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_text(response.into_body()).await, "Callback processed");

    let response = app.clone().oneshot(get_request("/task_status/T1")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "complete");

    let (song_id, audio_url): (String, String) =
        sqlx::query_as("SELECT song_id, audio_url FROM ai_songs WHERE song_id = 'S1'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(song_id, "S1");
    assert!(audio_url.starts_with("https://test-bucket.s3.us-east-1.amazonaws.com/"));
    assert!(audio_url.ends_with(".mp3"));
}

#[tokio::test]
async fn test_duplicate_callback_ignored() {
    let provider = Arc::new(MockProvider::returning("T1"));
    let (app, pool) = setup_app_with(Arc::clone(&provider)).await;
    let cookie = login_user(&app, "alice").await;
    generate(&app, &cookie).await;

    let payload = complete_callback("T1", "S1");
    let response = app
        .clone()
        .oneshot(json_request("POST", "/callback", payload.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Identical redelivery: no second song row, task stays complete
    let response = app
        .clone()
        .oneshot(json_request("POST", "/callback", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(extract_text(response.into_body()).await, "Already processed");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_songs WHERE song_id = 'S1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(provider.downloads.load(Ordering::SeqCst), 1);

    let status: String = sqlx::query_scalar("SELECT status FROM tasks WHERE task_id = 'T1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "complete");
}

#[tokio::test]
async fn test_callback_provider_failure_marks_error() {
    let (app, pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;
    generate(&app, &cookie).await;

    let mut payload = complete_callback("T1", "S1");
    payload["code"] = json!(500);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/callback", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: String = sqlx::query_scalar("SELECT status FROM tasks WHERE task_id = 'T1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "error");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_songs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_callback_unknown_task_rejected() {
    let (app, pool) = setup_app().await;

    let response = app
        .oneshot(json_request("POST", "/callback", complete_callback("T99", "S1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_text(response.into_body()).await, "Unknown task");

    let tasks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks")
        .fetch_one(&pool)
        .await
        .unwrap();
    let songs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_songs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!((tasks, songs), (0, 0));
}

#[tokio::test]
async fn test_callback_missing_task_id_rejected() {
    let (app, _pool) = setup_app().await;

    let payload = json!({ "code": 200, "data": { "callbackType": "complete", "data": [] } });
    let response = app
        .oneshot(json_request("POST", "/callback", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(extract_text(response.into_body()).await, "Missing task_id");
}

#[tokio::test]
async fn test_non_terminal_callback_does_not_mutate() {
    let (app, pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;
    generate(&app, &cookie).await;

    let mut payload = complete_callback("T1", "S1");
    payload["data"]["callbackType"] = json!("text");

    let response = app
        .clone()
        .oneshot(json_request("POST", "/callback", payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: String = sqlx::query_scalar("SELECT status FROM tasks WHERE task_id = 'T1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(status, "pending");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ai_songs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

// =============================================================================
// Libraries (Scenario F)
// =============================================================================

#[tokio::test]
async fn test_private_library_requires_login() {
    let (app, _pool) = setup_app().await;

    let response = app.oneshot(get_request("/api/songs/private")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_owned_song_is_private_not_public() {
    let (app, _pool) = setup_app().await;
    let cookie = login_user(&app, "alice").await;
    generate(&app, &cookie).await;

    app.clone()
        .oneshot(json_request("POST", "/callback", complete_callback("T1", "S1")))
        .await
        .unwrap();

    // Owner sees the song
    let request = Request::builder()
        .method("GET")
        .uri("/api/songs/private")
        .header(header::COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let songs = body.as_array().unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["title"], "Rainy Focus");
    assert!(songs[0]["audio_url"].as_str().unwrap().contains("test-bucket"));

    // The public library never includes it
    let response = app.oneshot(get_request("/api/songs/public")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_public_library_lists_unowned_songs() {
    let (app, pool) = setup_app().await;

    sqlx::query("INSERT INTO ai_songs (title, audio_url, song_id) VALUES ('Open Beat', 'url', 'S9')")
        .execute(&pool)
        .await
        .unwrap();

    let response = app.oneshot(get_request("/api/songs/public")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    let songs = body.as_array().unwrap();
    assert_eq!(songs.len(), 1);
    assert_eq!(songs[0]["title"], "Open Beat");
}

#[tokio::test]
async fn test_private_library_is_owner_scoped() {
    let (app, pool) = setup_app().await;
    let alice = login_user(&app, "alice").await;

    // Alice generates and completes a song
    generate(&app, &alice).await;
    app.clone()
        .oneshot(json_request("POST", "/callback", complete_callback("T1", "S1")))
        .await
        .unwrap();

    // Bob's library is empty
    let bob = login_user(&app, "bob").await;
    let request = Request::builder()
        .method("GET")
        .uri("/api/songs/private")
        .header(header::COOKIE, &bob)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    // And the song row is owned by Alice
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM ai_songs WHERE song_id = 'S1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(owner.is_some());
}

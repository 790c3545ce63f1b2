//! HTTP-level tests for deskmate-server.
//!
//! Each test builds the full router over an in-memory database, a scripted
//! AI backend and a temporary storage directory, then drives it with
//! `oneshot` requests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use deskmate_core::ai::{AiBackend, AiError, AiReply, AiRequest};
use deskmate_core::entities::{Role, SqliteStore, User};
use deskmate_core::users::CreateUserInput;
use deskmate_server::config::Config;
use deskmate_server::{build, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

/// Echoes the prompt back so assertions can see what reached the model.
struct ScriptedAi;

#[async_trait]
impl AiBackend for ScriptedAi {
    async fn generate(&self, request: &AiRequest) -> Result<AiReply, AiError> {
        Ok(AiReply {
            text: format!("Jawaban untuk: {}. Semoga membantu pekerjaan Anda hari ini.", request.message),
            provider: "scripted".into(),
            model: "test".into(),
        })
    }
}

struct TestApp {
    app: Router,
    state: Arc<AppState>,
    _storage: TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let storage = tempfile::tempdir().unwrap();
        let vars: HashMap<&str, String> = HashMap::from([
            ("DESK_STORAGE_DIR", storage.path().display().to_string()),
            ("DESK_STREAM_CHUNK_DELAY_MS", "0".to_owned()),
        ]);
        let config = Config::from_lookup(|key| vars.get(key).cloned());
        let store = SqliteStore::in_memory().await.unwrap();
        let state = Arc::new(AppState::new(config, store, Arc::new(ScriptedAi)).unwrap());
        Self { app: build(state.clone()), state, _storage: storage }
    }

    /// Create an account directly and log it in over HTTP.
    async fn user(&self, name: &str, role: Role) -> (User, String) {
        let email = format!("{name}@example.com");
        let user = self
            .state
            .users
            .create(CreateUserInput {
                name: name.to_owned(),
                email: email.clone(),
                password: "rahasia123".to_owned(),
                role,
            })
            .await
            .unwrap();
        let (status, body) = self
            .send(json_request("POST", "/auth/login", None, json!({"email": email, "password": "rahasia123"})))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (user, body["token"].as_str().unwrap().to_owned())
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn create_session(&self, token: &str, title: &str) -> i64 {
        let (status, body) = self
            .send(json_request("POST", "/chat/sessions", Some(token), json!({"title": title, "chat_type": "global"})))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn changelog_body(version: &str, published: bool) -> Value {
    json!({
        "version": version,
        "release_date": "2026-01-15",
        "type": "minor",
        "title": "Fitur baru",
        "description": "Perbaikan dan fitur baru.",
        "changes": ["Menambah ekspor laporan"],
        "is_published": published,
    })
}

// ── auth ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_needs_no_token() {
    let t = TestApp::new().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
    assert_eq!(body["excel_template"], false);
}

#[tokio::test]
async fn health_reports_unreachable_database() {
    let t = TestApp::new().await;
    t.state.store.pool().close().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["database"], "unavailable");
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let t = TestApp::new().await;
    let request = Request::builder().uri("/chat/sessions").body(Body::empty()).unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], deskmate_server::error::UNAUTHENTICATED);
}

#[tokio::test]
async fn login_me_and_logout() {
    let t = TestApp::new().await;
    let (user, token) = t.user("budi", Role::Engineer).await;

    let (status, body) = t.send(empty_request("GET", "/auth/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user.id);
    assert_eq!(body["role"], "engineer");
    assert!(body.get("password_hash").is_none());

    let (status, _) = t.send(empty_request("POST", "/auth/logout", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send(empty_request("GET", "/auth/me", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_a_field_error() {
    let t = TestApp::new().await;
    t.user("sari", Role::User).await;
    let (status, body) = t
        .send(json_request("POST", "/auth/login", None, json!({"email": "sari@example.com", "password": "salah"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
}

// ── chat ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn persona_session_requires_field_role() {
    let t = TestApp::new().await;
    let (_, plain) = t.user("umum", Role::User).await;
    let (_, drafter) = t.user("dina", Role::Drafter).await;
    let body = json!({"title": "Gambar kerja", "chat_type": "persona"});

    let (status, _) = t.send(json_request("POST", "/chat/sessions", Some(&plain), body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, created) = t.send(json_request("POST", "/chat/sessions", Some(&drafter), body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["persona"], "drafter");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Engineer).await;
    let id = t.create_session(&token, "Kosong").await;

    let uri = format!("/chat/sessions/{id}/messages");
    let (status, body) = t.send(json_request("POST", &uri, Some(&token), json!({"message": "   "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["message"].is_array());
}

#[tokio::test]
async fn send_persists_both_turns() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Engineer).await;
    let id = t.create_session(&token, "Diskusi").await;

    let uri = format!("/chat/sessions/{id}/messages");
    let (status, body) = t.send(json_request("POST", &uri, Some(&token), json!({"message": "halo"}))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user_message"]["sender"], "user");
    assert_eq!(body["ai_message"]["sender"], "ai");
    assert!(body["ai_message"]["message"].as_str().unwrap().contains("halo"));

    let (status, history) = t.send(empty_request("GET", &uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn shared_session_is_read_only_for_peers() {
    let t = TestApp::new().await;
    let (_, owner) = t.user("budi", Role::Engineer).await;
    let (_, peer) = t.user("andi", Role::Engineer).await;
    let (_, outsider) = t.user("dina", Role::Drafter).await;
    let id = t.create_session(&owner, "Bersama").await;
    let uri = format!("/chat/sessions/{id}");

    let (status, _) = t.send(empty_request("GET", &uri, &peer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let share = json!({"is_shared": true, "shared_with_roles": ["engineer"]});
    let (status, body) = t.send(json_request("PATCH", &uri, Some(&owner), share)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, detail) = t.send(empty_request("GET", &uri, &peer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["is_owner"], false);
    let (status, _) = t.send(empty_request("GET", &uri, &outsider)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let send_uri = format!("/chat/sessions/{id}/messages");
    let (status, _) = t.send(json_request("POST", &send_uri, Some(&peer), json!({"message": "boleh?"}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.send(empty_request("DELETE", &uri, &peer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stream_emits_start_chunks_and_complete() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Esr).await;
    let id = t.create_session(&token, "Streaming").await;

    let uri = format!("/chat/sessions/{id}/stream");
    let response = t
        .app
        .clone()
        .oneshot(json_request("POST", &uri, Some(&token), json!({"message": "cek laporan"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let events: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect();

    assert_eq!(events.first().unwrap()["type"], "start");
    assert_eq!(events.last().unwrap()["type"], "complete");
    let streamed: String = events
        .iter()
        .filter(|e| e["type"] == "chunk")
        .map(|e| e["content"].as_str().unwrap())
        .collect();
    assert_eq!(streamed, events.last().unwrap()["full_response"].as_str().unwrap());

    let (_, history) = t.send(empty_request("GET", &format!("/chat/sessions/{id}/messages"), &token)).await;
    assert_eq!(history.as_array().unwrap().len(), 2);
}

// ── admin ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_routes_reject_regular_users() {
    let t = TestApp::new().await;
    let (_, token) = t.user("umum", Role::User).await;
    for uri in ["/users", "/admin/changelog"] {
        let (status, _) = t.send(empty_request("GET", uri, &token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}

#[tokio::test]
async fn changelog_versions_are_unique() {
    let t = TestApp::new().await;
    let (_, admin) = t.user("admin", Role::Admin).await;

    let (status, _) = t.send(json_request("POST", "/admin/changelog", Some(&admin), changelog_body("1.2.0", false))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = t.send(json_request("POST", "/admin/changelog", Some(&admin), changelog_body("1.2.0", false))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["version"].is_array());
}

#[tokio::test]
async fn unpublished_entries_are_hidden_from_users() {
    let t = TestApp::new().await;
    let (_, admin) = t.user("admin", Role::Admin).await;
    let (_, user) = t.user("umum", Role::User).await;

    let (_, draft) = t.send(json_request("POST", "/admin/changelog", Some(&admin), changelog_body("0.9.0", false))).await;
    let uri = format!("/changelog/{}", draft["id"]);
    let (status, _) = t.send(empty_request("GET", &uri, &user)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = t.send(empty_request("GET", &uri, &admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn marking_read_is_idempotent() {
    let t = TestApp::new().await;
    let (_, admin) = t.user("admin", Role::Superadmin).await;
    let (_, user) = t.user("umum", Role::User).await;

    let (_, entry) = t.send(json_request("POST", "/admin/changelog", Some(&admin), changelog_body("2.0.0", true))).await;
    let (_, count) = t.send(empty_request("GET", "/api/changelog-notifications/unread-count", &user)).await;
    assert_eq!(count["count"], 1);

    let uri = format!("/api/changelog-notifications/{}/read", entry["id"]);
    for _ in 0..2 {
        let (status, _) = t.send(empty_request("POST", &uri, &user)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, count) = t.send(empty_request("GET", "/api/changelog-notifications/unread-count", &user)).await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn admins_cannot_delete_themselves() {
    let t = TestApp::new().await;
    let (me, token) = t.user("admin", Role::Admin).await;
    let (other, _) = t.user("umum", Role::User).await;

    let (status, _) = t.send(empty_request("DELETE", &format!("/users/{}", me.id), &token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = t.send(empty_request("DELETE", &format!("/users/{}", other.id), &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
}

// ── excel ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn copy_template_without_template_is_not_found() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Engineer).await;
    let (status, _) = t.send(empty_request("POST", "/excel/copy-template", &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_only_serves_generated_workbooks() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Engineer).await;
    for name in ["notes.txt", "missing.xlsx"] {
        let (status, _) = t.send(empty_request("GET", &format!("/excel/download/{name}"), &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{name}");
    }
    let (status, files) = t.send(empty_request("GET", "/excel/files", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(files, json!([]));
}

#[tokio::test]
async fn unknown_job_status_is_not_found_value() {
    let t = TestApp::new().await;
    let (_, token) = t.user("budi", Role::Engineer).await;
    let (status, body) = t.send(empty_request("GET", "/excel/jobs/nope/status", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "not_found");
}

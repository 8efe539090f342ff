//! Integration tests for the Scribe HTTP API.
//!
//! Uses axum-test to drive the router without a real listener, and wiremock
//! to stand in for the AI service.

// Holding the env MutexGuard across await is intentional: tests touching
// SCRIBE_* variables are serialized.
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use base64::Engine;
use scribe::api::{
    AppState, GenerateContentResponse, GenerateImageResponse, HealthResponse, SessionResponse,
    SpeechResponse, StagesResponse, create_router,
};
use scribe::config::OpenAiConfig;
use scribe::openai::OpenAiClient;
use scribe::session::SessionStore;
use scribe_core::{FeatureConfig, SeedPolicy, Stage};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Serializes tests since the router reads SCRIBE_* env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

/// Port nothing listens on, for tests that must never reach the AI service.
const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:9";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX.
        unsafe { std::env::remove_var("SCRIBE_API_KEY") };
    }
}

fn lock_env() -> TestGuard {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX.
    unsafe {
        std::env::remove_var("SCRIBE_API_KEY");
        std::env::remove_var("SCRIBE_CORS_ORIGINS");
        std::env::remove_var("SCRIBE_RATE_LIMIT");
    }
    TestGuard { _guard: guard }
}

fn build_server(base_url: &str, features: FeatureConfig, max_sessions: usize) -> TestServer {
    build_server_with_store(base_url, SessionStore::new(features, max_sessions))
}

fn build_server_with_store(base_url: &str, sessions: SessionStore) -> TestServer {
    let openai = OpenAiConfig {
        api_key: Some("sk-test".to_string()),
        base_url: base_url.to_string(),
        ..OpenAiConfig::default()
    };
    let client = OpenAiClient::new(&openai).unwrap();
    let state = AppState::new(sessions, client);
    TestServer::new(create_router(state)).unwrap()
}

/// Test server whose AI calls go nowhere.
fn create_test_server() -> (TestServer, TestGuard) {
    let guard = lock_env();
    let server = build_server(UNREACHABLE_BASE_URL, FeatureConfig::default(), 16);
    (server, guard)
}

/// Test server backed by a mock AI service.
async fn create_mocked_server() -> (TestServer, MockServer, TestGuard) {
    let guard = lock_env();
    let mock = MockServer::start().await;
    let server = build_server(&mock.uri(), FeatureConfig::default(), 16);
    (server, mock, guard)
}

async fn open_session(server: &TestServer) -> Uuid {
    let response = server.post("/sessions").await;
    response.assert_status(StatusCode::CREATED);
    let body: SessionResponse = response.json();
    body.session_id.unwrap()
}

/// Advance `steps` times and return the final state.
async fn advance(server: &TestServer, id: Uuid, steps: usize) -> SessionResponse {
    let mut last = None;
    for _ in 0..steps {
        let response = server.post(&format!("/sessions/{}/next", id)).await;
        response.assert_status_ok();
        last = Some(response.json::<SessionResponse>());
    }
    match last {
        Some(state) => state,
        None => server.get(&format!("/sessions/{}", id)).await.json(),
    }
}

async fn set_post(server: &TestServer, id: Uuid, title: &str, content: &str) {
    server
        .put(&format!("/sessions/{}/post", id))
        .json(&json!({ "title": title, "content": content }))
        .await
        .assert_status_ok();
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

// =============================================================================
// HEALTH & STAGES
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_stages_lists_five_in_order() {
    let (server, _guard) = create_test_server();

    let response = server.get("/stages").await;

    response.assert_status_ok();
    let table: StagesResponse = response.json();
    let labels: Vec<&str> = table.stages.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "Basic Blog Editor",
            "Content Generation",
            "Streaming Content",
            "Image Generation",
            "Text-to-Speech"
        ]
    );
}

// =============================================================================
// SESSION NAVIGATION
// =============================================================================

#[tokio::test]
async fn test_new_session_starts_locked() {
    let (server, _guard) = create_test_server();

    let response = server.post("/sessions").await;

    response.assert_status(StatusCode::CREATED);
    let body: SessionResponse = response.json();
    let state = body.state.unwrap();
    assert_eq!(state.cursor, 0);
    assert_eq!(state.label, "Basic Blog Editor");
    assert!(state.has_next);
    assert!(!state.has_previous);
    assert_eq!(state.features.enabled().count(), 0);
    assert_eq!(body.post.unwrap().title, "");
}

#[tokio::test]
async fn test_two_advances_unlock_two_features() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let state = advance(&server, id, 2).await.state.unwrap();

    assert_eq!(state.cursor, 2);
    assert_eq!(state.stage, Stage::StreamingContent);
    assert!(state.features.standard_generation);
    assert!(state.features.streaming_generation);
    assert!(!state.features.image_generation);
    assert!(!state.features.speech_generation);
}

#[tokio::test]
async fn test_next_at_last_stage_is_noop() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let state = advance(&server, id, 6).await.state.unwrap();

    assert_eq!(state.cursor, 4);
    assert_eq!(state.label, "Text-to-Speech");
    assert!(!state.has_next);
    assert!(state.features.speech_generation);
}

#[tokio::test]
async fn test_previous_at_first_stage_is_noop() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let response = server.post(&format!("/sessions/{}/previous", id)).await;

    response.assert_status_ok();
    let state = response.json::<SessionResponse>().state.unwrap();
    assert_eq!(state.cursor, 0);
    assert!(!state.has_previous);
}

#[tokio::test]
async fn test_previous_relocks_feature() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 3).await;

    let response = server.post(&format!("/sessions/{}/previous", id)).await;

    let state = response.json::<SessionResponse>().state.unwrap();
    assert_eq!(state.cursor, 2);
    assert!(!state.features.image_generation);
    assert!(state.features.streaming_generation);
}

#[tokio::test]
async fn test_reset_returns_to_editor() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 4).await;

    let response = server.post(&format!("/sessions/{}/reset", id)).await;

    let state = response.json::<SessionResponse>().state.unwrap();
    assert_eq!(state.cursor, 0);
    assert_eq!(state.features.enabled().count(), 0);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (server, _guard) = create_test_server();
    let a = open_session(&server).await;
    let b = open_session(&server).await;

    advance(&server, a, 3).await;

    let state_b = server
        .get(&format!("/sessions/{}", b))
        .await
        .json::<SessionResponse>()
        .state
        .unwrap();
    assert_eq!(state_b.cursor, 0);
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (server, _guard) = create_test_server();

    let response = server.get(&format!("/sessions/{}", Uuid::new_v4())).await;

    response.assert_status_not_found();
    let body: SessionResponse = response.json();
    assert!(!body.success);
    assert_eq!(body.error.as_deref(), Some("Session not found"));
}

#[tokio::test]
async fn test_malformed_session_id_is_client_error() {
    let (server, _guard) = create_test_server();

    let response = server.get("/sessions/not-a-uuid").await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_delete_session() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    server
        .delete(&format!("/sessions/{}", id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/sessions/{}", id))
        .await
        .assert_status_not_found();
    server
        .delete(&format!("/sessions/{}", id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_session_limit_is_503() {
    let _guard = lock_env();
    let server = build_server(UNREACHABLE_BASE_URL, FeatureConfig::default(), 1);
    open_session(&server).await;

    let response = server.post("/sessions").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_idle_sessions_free_the_cap() {
    let _guard = lock_env();
    let store = SessionStore::new(FeatureConfig::default(), 2)
        .with_idle_timeout(Some(Duration::from_millis(50)));
    let server = build_server_with_store(UNREACHABLE_BASE_URL, store);
    let abandoned = open_session(&server).await;
    open_session(&server).await;
    server
        .post("/sessions")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let response = server.post("/sessions").await;
    response.assert_status(StatusCode::CREATED);
    server
        .get(&format!("/sessions/{}", abandoned))
        .await
        .assert_status_not_found();
}

// =============================================================================
// SEEDED SESSIONS
// =============================================================================

#[tokio::test]
async fn test_aligned_seed_starts_at_prefix_end() {
    let _guard = lock_env();
    let features = FeatureConfig {
        enable_standard_content_generation: true,
        enable_streaming_content_generation: true,
        ..FeatureConfig::default()
    };
    let server = build_server(UNREACHABLE_BASE_URL, features, 4);

    let state = server
        .post("/sessions")
        .await
        .json::<SessionResponse>()
        .state
        .unwrap();

    assert_eq!(state.cursor, 2);
    assert!(state.features.streaming_generation);
    assert!(!state.features.image_generation);
}

#[tokio::test]
async fn test_hint_seed_is_discarded_on_first_move() {
    let _guard = lock_env();
    let features = FeatureConfig {
        enable_speech_generation: true,
        seed_policy: SeedPolicy::Hint,
        ..FeatureConfig::default()
    };
    let server = build_server(UNREACHABLE_BASE_URL, features, 4);

    let body: SessionResponse = server.post("/sessions").await.json();
    let seeded = body.state.unwrap();
    assert_eq!(seeded.cursor, 0);
    assert!(seeded.seeded);
    assert!(seeded.features.speech_generation);

    let moved = advance(&server, body.session_id.unwrap(), 1)
        .await
        .state
        .unwrap();
    assert!(!moved.seeded);
    assert!(moved.features.standard_generation);
    assert!(!moved.features.speech_generation);
}

// =============================================================================
// POST EDITING
// =============================================================================

#[tokio::test]
async fn test_update_post() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let response = server
        .put(&format!("/sessions/{}/post", id))
        .json(&json!({ "title": "Rust in Production", "content": "<p>Hi</p>" }))
        .await;

    response.assert_status_ok();
    let post = response.json::<SessionResponse>().post.unwrap();
    assert_eq!(post.title, "Rust in Production");
    assert_eq!(post.content, "<p>Hi</p>");
}

#[tokio::test]
async fn test_update_post_rejects_long_title() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let response = server
        .put(&format!("/sessions/{}/post", id))
        .json(&json!({ "title": "x".repeat(101) }))
        .await;

    response.assert_status_bad_request();
    let body: SessionResponse = response.json();
    assert!(!body.success);
}

#[tokio::test]
async fn test_update_post_rejects_blank_title() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let response = server
        .put(&format!("/sessions/{}/post", id))
        .json(&json!({ "title": "   " }))
        .await;

    response.assert_status_bad_request();
}

#[tokio::test]
async fn test_invalid_json_body() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;

    let response = server
        .put(&format!("/sessions/{}/post", id))
        .text("not valid json")
        .content_type("application/json")
        .await;

    assert!(response.status_code().is_client_error());
}

// =============================================================================
// CONTENT GENERATION
// =============================================================================

#[tokio::test]
async fn test_content_locked_at_editor_stage() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>x</p>")))
        .expect(0)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({ "title": "Locked" }))
        .await;

    response.assert_status_forbidden();
    let body: GenerateContentResponse = response.json();
    assert!(body.error.unwrap().contains("standardGeneration"));
}

#[tokio::test]
async fn test_generate_content_stores_draft() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "gpt-4o" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("<h2>Intro</h2><p>Body</p>")),
        )
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({ "title": "Ownership Explained" }))
        .await;

    response.assert_status_ok();
    let body: GenerateContentResponse = response.json();
    assert_eq!(body.content.as_deref(), Some("<h2>Intro</h2><p>Body</p>"));

    let post = server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionResponse>()
        .post
        .unwrap();
    assert_eq!(post.title, "Ownership Explained");
    assert_eq!(post.content, "<h2>Intro</h2><p>Body</p>");
}

#[tokio::test]
async fn test_generate_content_uses_draft_title() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>ok</p>")))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Draft Title", "").await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({}))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_generate_content_requires_title() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("x")))
        .expect(0)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({}))
        .await;

    response.assert_status_bad_request();
    let body: GenerateContentResponse = response.json();
    assert_eq!(body.error.as_deref(), Some("Title is required."));
}

#[tokio::test]
async fn test_upstream_rate_limit_is_503() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({ "title": "Busy" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_upstream_error_is_502_with_message() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "The server had an error", "type": "server_error" }
        })))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({ "title": "Broken" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: GenerateContentResponse = response.json();
    let error = body.error.unwrap();
    assert!(error.starts_with("Error generating content"));
    assert!(error.contains("The server had an error"));
}

#[tokio::test]
async fn test_upstream_unauthorized_is_502() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .json(&json!({ "title": "Locked Out" }))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body: GenerateContentResponse = response.json();
    assert!(body.error.unwrap().contains("Unauthorized"));
}

#[tokio::test]
async fn test_generate_content_accepts_bare_post() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("<p>ok</p>")))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Draft Title", "").await;
    advance(&server, id, 1).await;

    let response = server
        .post(&format!("/sessions/{}/generate/content", id))
        .await;

    response.assert_status_ok();
    let body: GenerateContentResponse = response.json();
    assert_eq!(body.content.as_deref(), Some("<p>ok</p>"));
}

#[tokio::test]
async fn test_generated_content_dropped_if_stage_moves_back() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("<p>late</p>"))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Original", "<p>mine</p>").await;
    advance(&server, id, 1).await;

    let generate = async {
        server
            .post(&format!("/sessions/{}/generate/content", id))
            .json(&json!({ "title": "Replacement" }))
            .await
    };
    let retreat = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        server.post(&format!("/sessions/{}/previous", id)).await
    };
    let (generated, retreated) = tokio::join!(generate, retreat);

    retreated.assert_status_ok();
    generated.assert_status_forbidden();
    let body: GenerateContentResponse = generated.json();
    assert!(body.error.unwrap().contains("standardGeneration"));

    let post = server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionResponse>()
        .post
        .unwrap();
    assert_eq!(post.title, "Original");
    assert_eq!(post.content, "<p>mine</p>");
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn test_stream_emits_tokens_in_order() {
    let (server, mock, _guard) = create_mocked_server().await;
    let upstream = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"<p>Hello\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" world</p>\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(upstream, "text/event-stream"))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 2).await;

    let response = server
        .get(&format!("/sessions/{}/generate/stream", id))
        .add_query_param("title", "Streams")
        .await;

    response.assert_status_ok();
    let body = response.text();
    let hello = body.find(r#""text":"<p>Hello""#).unwrap();
    let world = body.find(r#""text":" world</p>""#).unwrap();
    let done = body.find("event: done").unwrap();
    assert!(hello < world && world < done);
    assert_eq!(body.matches("event: token").count(), 2);
    assert!(!body.contains("event: error"));
}

#[tokio::test]
async fn test_stream_broken_midway_emits_error_not_done() {
    let (server, mock, _guard) = create_mocked_server().await;
    let mut upstream =
        b"data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"<p>Half\"}}]}\n\n"
            .to_vec();
    upstream.push(0xff);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(upstream, "text/event-stream"))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 2).await;

    let response = server
        .get(&format!("/sessions/{}/generate/stream", id))
        .add_query_param("title", "Interrupted")
        .await;

    response.assert_status_ok();
    let body = response.text();
    let token = body.find(r#""text":"<p>Half""#).unwrap();
    let error = body.find("event: error").unwrap();
    assert!(token < error);
    assert_eq!(body.matches("event: error").count(), 1);
    assert!(!body.contains("event: done"));
}

#[tokio::test]
async fn test_stream_closed_without_done_marker_is_error() {
    let (server, mock, _guard) = create_mocked_server().await;
    let upstream = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"<p>Cut\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\" short\"}}]}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(upstream, "text/event-stream"))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 2).await;

    let response = server
        .get(&format!("/sessions/{}/generate/stream", id))
        .add_query_param("title", "Truncated")
        .await;

    response.assert_status_ok();
    let body = response.text();
    assert_eq!(body.matches("event: token").count(), 2);
    assert!(body.contains("connection closed before completion"));
    assert!(!body.contains("event: done"));
}

#[tokio::test]
async fn test_stream_locked_before_streaming_stage() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 1).await;

    let response = server
        .get(&format!("/sessions/{}/generate/stream", id))
        .add_query_param("title", "Too early")
        .await;

    response.assert_status_forbidden();
}

// =============================================================================
// IMAGE GENERATION
// =============================================================================

#[tokio::test]
async fn test_generate_image_attaches_url() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/images/generations"))
        .and(body_partial_json(json!({
            "model": "dall-e-3",
            "size": "1024x1024",
            "n": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "created": 1,
            "data": [{ "url": "https://images.example/header.png" }]
        })))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Lifetimes", "<p>Borrowing rules.</p>").await;
    advance(&server, id, 3).await;

    let response = server
        .post(&format!("/sessions/{}/generate/image", id))
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: GenerateImageResponse = response.json();
    assert_eq!(body.url.as_deref(), Some("https://images.example/header.png"));

    let post = server
        .get(&format!("/sessions/{}", id))
        .await
        .json::<SessionResponse>()
        .post
        .unwrap();
    assert_eq!(
        post.header_image_url.as_deref(),
        Some("https://images.example/header.png")
    );
}

#[tokio::test]
async fn test_generate_image_requires_content() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 3).await;

    let response = server
        .post(&format!("/sessions/{}/generate/image", id))
        .json(&json!({ "title": "No body yet" }))
        .await;

    response.assert_status_bad_request();
}

// =============================================================================
// SPEECH GENERATION
// =============================================================================

#[tokio::test]
async fn test_generate_speech_returns_mp3() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_partial_json(json!({ "model": "tts-1", "voice": "nova" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3fake".to_vec(), "audio/mpeg"))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    advance(&server, id, 4).await;

    let response = server
        .post(&format!("/sessions/{}/generate/speech", id))
        .json(&json!({ "content": "<p>Read me</p>", "voice": "nova" }))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(header::CONTENT_TYPE), "audio/mpeg");
    assert_eq!(response.as_bytes().as_ref(), b"ID3fake");
}

#[tokio::test]
async fn test_generate_speech_base64() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .and(body_partial_json(json!({ "voice": "alloy" })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3fake".to_vec(), "audio/mpeg"))
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Narrated", "<p>Draft body</p>").await;
    advance(&server, id, 4).await;

    let response = server
        .post(&format!("/sessions/{}/generate/speech", id))
        .add_query_param("format", "base64")
        .json(&json!({}))
        .await;

    response.assert_status_ok();
    let body: SpeechResponse = response.json();
    let audio = base64::engine::general_purpose::STANDARD
        .decode(body.audio.unwrap())
        .unwrap();
    assert_eq!(audio, b"ID3fake");
}

#[tokio::test]
async fn test_generate_speech_accepts_bare_post() {
    let (server, mock, _guard) = create_mocked_server().await;
    Mock::given(method("POST"))
        .and(path("/audio/speech"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"ID3bare".to_vec(), "audio/mpeg"))
        .expect(1)
        .mount(&mock)
        .await;
    let id = open_session(&server).await;
    set_post(&server, id, "Narrated", "<p>Read me aloud.</p>").await;
    advance(&server, id, 4).await;

    let response = server
        .post(&format!("/sessions/{}/generate/speech", id))
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"ID3bare");
}

#[tokio::test]
async fn test_generate_speech_rejects_unknown_voice() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 4).await;

    let response = server
        .post(&format!("/sessions/{}/generate/speech", id))
        .json(&json!({ "content": "<p>x</p>", "voice": "robot" }))
        .await;

    assert!(response.status_code().is_client_error());
}

#[tokio::test]
async fn test_speech_locked_before_last_stage() {
    let (server, _guard) = create_test_server();
    let id = open_session(&server).await;
    advance(&server, id, 3).await;

    let response = server
        .post(&format!("/sessions/{}/generate/speech", id))
        .json(&json!({ "content": "<p>x</p>" }))
        .await;

    response.assert_status_forbidden();
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let (server, _guard) = create_test_server();

    server.get("/unknown").await.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (server, _guard) = create_test_server();

    let response = server.post("/health").await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

// =============================================================================
// AUTHENTICATION MIDDLEWARE TESTS
// =============================================================================

/// Must be called while holding the env guard.
fn create_auth_test_server(api_key: &str) -> TestServer {
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX.
    unsafe { std::env::set_var("SCRIBE_API_KEY", api_key) };
    build_server(UNREACHABLE_BASE_URL, FeatureConfig::default(), 4)
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let _guard = lock_env();
    let server = create_auth_test_server("test-secret-key-12345");

    let response = server
        .get("/stages")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer test-secret-key-12345"),
        )
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let _guard = lock_env();
    let server = create_auth_test_server("test-secret-key-12345");

    let response = server
        .post("/sessions")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer wrong-key"),
        )
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let _guard = lock_env();
    let server = create_auth_test_server("test-secret-key-12345");

    server.get("/stages").await.assert_status_unauthorized();
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let _guard = lock_env();
    let server = create_auth_test_server("test-secret-key-12345");

    server.get("/health").await.assert_status_ok();
}

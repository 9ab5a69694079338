//! Integration tests for `HttpSessionBackend` against a mock HTTP server.

use serde_json::json;
use tenure_backend::{HttpSessionBackend, SessionBackend};
use tenure_protocol::{Credentials, ErrorCategory};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =========================================================================
// Helpers
// =========================================================================

async fn backend_for(server: &MockServer) -> HttpSessionBackend {
    HttpSessionBackend::new(&format!("{}/api", server.uri()))
        .expect("mock server uri is valid")
}

// =========================================================================
// create
// =========================================================================

#[tokio::test]
async fn test_create_posts_credentials_and_returns_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"loginId": "alice", "pw": "secret"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "sessionId": "s-42",
            "maxAgeSeconds": 120,
            "userId": "alice",
        })))
        .expect(1)
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let info = backend
        .create(&Credentials::new("alice", "secret"))
        .await
        .expect("create should succeed");

    assert_eq!(info.session_id, "s-42");
    assert_eq!(info.max_age_seconds, 120.0);
    assert_eq!(info.extra["userId"], "alice");
}

#[tokio::test]
async fn test_create_rejection_passes_widget_errors_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/sessions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "errors": [
                {"message": "invalid password", "options": {"widget": "pw"}},
            ],
        })))
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let errors = backend
        .create(&Credentials::new("alice", "wrong"))
        .await
        .expect_err("create should fail");

    assert_eq!(errors.len(), 1);
    let err = errors.iter().next().unwrap();
    assert_eq!(err.message, "invalid password");
    assert_eq!(err.widget(), Some("pw"));
    assert_eq!(err.options.category, None);
}

// =========================================================================
// renew
// =========================================================================

#[tokio::test]
async fn test_renew_patches_session_url() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/sessions/s-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sessionId": "s-42",
            "maxAgeSeconds": 90,
        })))
        .expect(1)
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let info = backend.renew("s-42").await.expect("renew should succeed");

    assert_eq!(info.max_age_seconds, 90.0);
}

#[tokio::test]
async fn test_renew_error_without_body_uses_status_text() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/sessions/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let errors = backend.renew("gone").await.expect_err("should fail");

    assert_eq!(errors.to_string(), "Not Found");
}

#[tokio::test]
async fn test_renew_success_with_garbage_body_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/sessions/s-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html/>"))
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let errors = backend.renew("s-1").await.expect_err("should fail");

    assert_eq!(
        errors.iter().next().unwrap().options.category,
        Some(ErrorCategory::Transport)
    );
}

#[tokio::test]
async fn test_renew_unreachable_server_is_transport_error() {
    // Learn a free port, then close it. A dropped MockServer goes back to
    // wiremock's pool and keeps answering, so it can't stand in here.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    let backend =
        HttpSessionBackend::new(&format!("http://{addr}")).expect("valid uri");

    let errors = backend.renew("s-1").await.expect_err("should fail");

    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.iter().next().unwrap().options.category,
        Some(ErrorCategory::Transport)
    );
}

// =========================================================================
// revoke
// =========================================================================

#[tokio::test]
async fn test_revoke_accepts_empty_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/sessions/s-42"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    backend.revoke("s-42").await.expect("revoke should succeed");
}

#[tokio::test]
async fn test_revoke_rejection_returns_error_list() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/sessions/s-42"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": [{"message": "unknown session"}],
        })))
        .mount(&server)
        .await;
    let backend = backend_for(&server).await;

    let errors = backend.revoke("s-42").await.expect_err("should fail");

    assert_eq!(errors.to_string(), "unknown session");
}

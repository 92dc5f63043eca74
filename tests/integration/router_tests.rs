// =================================
// tests/integration/router_tests.rs
// =================================
//! HTTP routes exercised through the router without a socket
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use campus_identity_common::{ErrorBody, HealthResponse, LoginResponse, RegisterResponse, UserProfile};
use identity_lib::router::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::test_utils::setup_test_env;

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn register_and_login(app: &Router, email: &str) -> LoginResponse {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/users",
            json!({"email": email, "password": "pw123", "nickname": "Al"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/sessions",
            json!({"email": email, "password": "pw123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_register_login_profile() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users",
            json!({"email": "a@x.com", "password": "pw123", "nickname": "Al", "avatar": "al.png"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let registered: RegisterResponse = serde_json::from_slice(&body).unwrap();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/sessions",
            json!({"email": "a@x.com", "password": "pw123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let login: LoginResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(login.token_type, "Bearer");
    assert_eq!(login.user_id, registered.user_id);

    let (status, body) = send(&app, bearer_request(Method::GET, "/api/v1/users/me", &login.token)).await;
    assert_eq!(status, StatusCode::OK);
    let profile: UserProfile = serde_json::from_slice(&body).unwrap();
    assert_eq!(profile.user_id, registered.user_id);
    assert_eq!(profile.avatar, "al.png");

    // The profile never carries the hash.
    let raw: Value = serde_json::from_slice(&body).unwrap();
    assert!(raw.get("password_hash").is_none());

    let uri = format!("/api/v1/users/{}", registered.user_id);
    let (status, body) = send(&app, bearer_request(Method::GET, &uri, &login.token)).await;
    assert_eq!(status, StatusCode::OK);
    let by_id: UserProfile = serde_json::from_slice(&body).unwrap();
    assert_eq!(by_id, profile);
}

#[tokio::test]
async fn test_error_envelopes() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);
    register_and_login(&app, "a@x.com").await;

    // Duplicate registration
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users",
            json!({"email": "a@x.com", "password": "pw456", "nickname": "Al2"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "USER_001");

    // Wrong password
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/sessions",
            json!({"email": "a@x.com", "password": "wrong"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "AUTH_001");

    // Blank field
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users",
            json!({"email": "b@x.com", "password": " ", "nickname": "B"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "VAL_001");

    // Body that is not JSON
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/sessions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "VAL_001");
}

#[tokio::test]
async fn test_missing_or_bad_bearer() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);

    let request = Request::builder().uri("/api/v1/users/me").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "AUTH_002");

    let (status, _) = send(&app, bearer_request(Method::GET, "/api/v1/users/me", "garbage")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_foreign_profile_forbidden() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);

    let alice = register_and_login(&app, "alice@x.com").await;
    let bob = register_and_login(&app, "bob@x.com").await;

    let uri = format!("/api/v1/users/{}", bob.user_id);
    let (status, body) = send(&app, bearer_request(Method::GET, &uri, &alice.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let error: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(error.error.code, "AUTH_004");
    assert!(!String::from_utf8_lossy(&body).contains(&bob.user_id));

    // Their own profile is still readable with the same token.
    let uri = format!("/api/v1/users/{}", alice.user_id);
    let (status, _) = send(&app, bearer_request(Method::GET, &uri, &alice.token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state.clone());
    let login = register_and_login(&app, "a@x.com").await;
    assert_eq!(state.sessions.as_ref().map(|cache| cache.len()), Some(1));

    let (status, _) = send(&app, bearer_request(Method::DELETE, "/api/v1/sessions", &login.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, bearer_request(Method::GET, "/api/v1/users/me", &login.token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_request_id_header_accepted() {
    let (state, _temp_dir) = setup_test_env();
    let app = create_router(state);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/sessions")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-request-id", "req-abc-123")
        .body(Body::from(json!({"email": "nobody@x.com", "password": "pw"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

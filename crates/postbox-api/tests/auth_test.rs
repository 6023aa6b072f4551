//! Integration tests for scheduler authentication and the role gate.
//!
//! Exercises the full middleware chain through HTTP request scenarios:
//! marker header handling, body buffering, secret comparison, and the
//! 401 produced by the authorization gate.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::Extension,
    http::{Request, StatusCode},
    middleware,
    response::Json,
    routing::post,
    Router,
};
use postbox_api::{
    handlers,
    middleware::auth::{require_scheduler, scheduler_auth, SCHEDULER_JOB_HEADER},
    SharedSecret,
};
use postbox_core::Principal;
use serde_json::json;
use tower::ServiceExt;

/// Builds a router with the production middleware chain plus probe
/// routes for observing pass-through behavior.
fn test_app(secret: SharedSecret) -> Router {
    let guarded = Router::new()
        .route("/schedule/refresh", post(handlers::trigger_refresh))
        .route("/whoami", post(whoami))
        .route_layer(middleware::from_fn(require_scheduler));

    Router::new()
        .route("/echo", post(echo))
        .merge(guarded)
        .layer(middleware::from_fn_with_state(Arc::new(secret), scheduler_auth))
}

/// Unguarded route that reads the body, proving it survives buffering.
async fn echo(body: String) -> String {
    body
}

/// Guarded route exposing the attached principal's claims.
async fn whoami(Extension(principal): Extension<Principal>) -> Json<serde_json::Value> {
    Json(json!({
        "name": principal.name,
        "role": principal.role.to_string(),
        "issuer": principal.issuer,
    }))
}

fn scheduler_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(SCHEDULER_JOB_HEADER, "job-42")
        .body(Body::from(body.to_string()))
        .expect("request build")
}

#[tokio::test]
async fn correct_secret_reaches_guarded_endpoint() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response = app
        .oneshot(scheduler_request("/schedule/refresh", "secret:topsecret"))
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn wrong_secret_is_rejected_by_gate() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response = app
        .oneshot(scheduler_request("/schedule/refresh", "secret:wrong"))
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_marker_header_is_rejected_by_gate() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let request = Request::builder()
        .method("POST")
        .uri("/schedule/refresh")
        .body(Body::from("secret:topsecret"))
        .expect("request build");

    let response = app.oneshot(request).await.expect("request execution");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn body_without_prefix_stays_unauthenticated() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response = app
        .oneshot(scheduler_request("/schedule/refresh", "topsecret"))
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn secret_value_is_trimmed_before_comparison() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response = app
        .oneshot(scheduler_request("/schedule/refresh", "secret:  topsecret \n"))
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn absent_secret_never_authenticates() {
    let app = test_app(SharedSecret::from_config(None));

    let response = app
        .oneshot(scheduler_request("/schedule/refresh", "secret:topsecret"))
        .await
        .expect("request execution");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn marker_header_name_is_case_insensitive() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let request = Request::builder()
        .method("POST")
        .uri("/schedule/refresh")
        .header("X-MS-Scheduler-JobId", "job-42")
        .body(Body::from("secret:topsecret"))
        .expect("request build");

    let response = app.oneshot(request).await.expect("request execution");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn authenticated_principal_carries_scheduler_claims() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response =
        app.oneshot(scheduler_request("/whoami", "secret:topsecret")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let body =
        axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body extraction");
    let claims: serde_json::Value = serde_json::from_slice(&body).expect("json deserialization");

    assert_eq!(claims["name"], "scheduler");
    assert_eq!(claims["role"], "scheduler");
    assert_eq!(claims["issuer"], "application");
}

#[tokio::test]
async fn buffered_body_remains_readable_downstream() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let response =
        app.oneshot(scheduler_request("/echo", "secret:topsecret")).await.expect("request");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&body[..], b"secret:topsecret");
}

#[tokio::test]
async fn request_without_header_passes_through_with_body_intact() {
    let app = test_app(SharedSecret::from_config(Some("topsecret".to_string())));

    let request = Request::builder()
        .method("POST")
        .uri("/echo")
        .body(Body::from("arbitrary payload"))
        .expect("request build");

    let response = app.oneshot(request).await.expect("request execution");

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert_eq!(&body[..], b"arbitrary payload");
}

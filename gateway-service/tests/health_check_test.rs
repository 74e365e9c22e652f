//! Health and metrics endpoint tests.

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp};

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn();

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "gateway-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn();

    let response = app.get("/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn metrics_endpoint_returns_prometheus_text() {
    let app = TestApp::spawn();

    let response = app.get("/metrics", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_endpoints_need_no_caller_header() {
    let app = TestApp::spawn();

    // Probes run unauthenticated; only the business routes gate on caller id
    assert_eq!(app.get("/health", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/ready", None).await.status(), StatusCode::OK);
}

//! Session status endpoint tests.

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp, TEST_CALLER};

#[tokio::test]
async fn session_status_requires_caller_header() {
    let app = TestApp::spawn();

    let response = app.get("/session", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_status_reports_inactive_without_session() {
    let app = TestApp::spawn();

    let response = app.get("/session", Some(TEST_CALLER)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["active"], false);
    assert!(body.get("session_id").is_none() || body["session_id"].is_null());
}

#[tokio::test]
async fn session_status_reports_budget_for_live_session() {
    let app = TestApp::spawn();
    let session_id = app.seed_session(TEST_CALLER, 200_000, 1_500).await;

    let response = app.get("/session", Some(TEST_CALLER)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["active"], true);
    assert_eq!(body["session_id"], session_id.as_str());
    assert_eq!(body["tokens_used"], 1_500);
    assert_eq!(body["token_limit"], 200_000);
    assert_eq!(body["tokens_remaining"], 198_500);
}

#[tokio::test]
async fn session_status_is_scoped_to_the_caller() {
    let app = TestApp::spawn();
    app.seed_session("caller-a", 200_000, 0).await;

    let body = body_json(app.get("/session", Some("caller-b")).await).await;
    assert_eq!(body["active"], false);
}

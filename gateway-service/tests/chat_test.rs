//! Chat pipeline integration tests: authentication, session gating,
//! quota accounting, and upstream failure handling.

mod common;

use axum::http::StatusCode;
use common::{body_json, TestApp, TEST_CALLER};
use serde_json::json;

#[tokio::test]
async fn chat_without_caller_header_is_unauthenticated() {
    let app = TestApp::spawn();

    let response = app
        .post_json("/chat", None, json!({ "message": "hello" }))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["reason"], "unauthenticated");
}

#[tokio::test]
async fn chat_without_session_is_payment_required() {
    let app = TestApp::spawn();

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": "hello" }))
        .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["reason"], "no_active_session");
}

#[tokio::test]
async fn chat_with_empty_message_is_rejected() {
    let app = TestApp::spawn();
    app.seed_session(TEST_CALLER, 200_000, 0).await;

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": "" }))
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn chat_commits_tokens_and_records_usage() {
    let app = TestApp::spawn();
    let session_id = app.seed_session(TEST_CALLER, 200_000, 0).await;

    let message = "hello there";
    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": message }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["model"], "gpt-4o-mini");
    let reply = body["reply"].as_str().expect("reply is a string");
    assert!(reply.contains(message));

    // ceil(chars / 4) for prompt and reply
    let expected_tokens =
        (message.chars().count() as i64 + 3) / 4 + (reply.chars().count() as i64 + 3) / 4;

    let session = app.store.session(&session_id).expect("session exists");
    assert_eq!(session.tokens_used, expected_tokens);

    app.settle().await;
    let usage = app.store.usage_snapshot();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0].caller_id, TEST_CALLER);
    assert_eq!(usage[0].session_id, session_id);
    assert_eq!(usage[0].est_tokens, expected_tokens);
    assert_eq!(usage[0].prompt_chars, message.chars().count() as i64);
}

#[tokio::test]
async fn chat_near_quota_is_rejected_before_upstream() {
    let app = TestApp::spawn();
    // 198_001 + 2_000 headroom exceeds the 200_000 budget
    app.seed_session(TEST_CALLER, 200_000, 198_001).await;

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": "hello" }))
        .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["reason"], "quota_exhausted");

    app.settle().await;
    assert!(app.store.usage_snapshot().is_empty());
}

#[tokio::test]
async fn chat_exactly_at_headroom_boundary_passes_precheck() {
    let app = TestApp::spawn();
    // 198_000 + 2_000 == 200_000: not strictly over, so the request proceeds
    app.seed_session(TEST_CALLER, 200_000, 198_000).await;

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": "hi" }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_over_budget_at_commit_is_rejected_without_spend() {
    let app = TestApp::spawn();
    // Budget passes the headroom pre-check but cannot absorb the actual
    // exchange: the conditional commit must refuse and leave usage at zero.
    let long_message = "x".repeat(20_000);
    let session_id = app.seed_session(TEST_CALLER, 3_000, 0).await;

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": long_message }))
        .await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = body_json(response).await;
    assert_eq!(body["reason"], "quota_exhausted");

    let session = app.store.session(&session_id).expect("session exists");
    assert_eq!(session.tokens_used, 0);
}

#[tokio::test]
async fn chat_upstream_failure_commits_nothing() {
    let app = TestApp::spawn_with_failing_provider();
    let session_id = app.seed_session(TEST_CALLER, 200_000, 0).await;

    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": "hello" }))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["reason"], "upstream_failure");

    let session = app.store.session(&session_id).expect("session exists");
    assert_eq!(session.tokens_used, 0);

    app.settle().await;
    assert!(app.store.usage_snapshot().is_empty());
}

#[tokio::test]
async fn chat_routes_long_prompts_to_heavy_model() {
    let app = TestApp::spawn();
    app.seed_session(TEST_CALLER, 200_000, 0).await;

    let long_message = "a".repeat(700);
    let response = app
        .post_json("/chat", Some(TEST_CALLER), json!({ "message": long_message }))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "anthropic");
    assert_eq!(body["model"], "claude-3-5-sonnet-20241022");
}

#[tokio::test]
async fn chat_routes_heavy_keywords_to_heavy_model() {
    let app = TestApp::spawn();
    app.seed_session(TEST_CALLER, 200_000, 0).await;

    let response = app
        .post_json(
            "/chat",
            Some(TEST_CALLER),
            json!({ "message": "Please analyze this contract" }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "anthropic");
}

#[tokio::test]
async fn chat_override_wins_over_heuristics() {
    let app = TestApp::spawn();
    app.seed_session(TEST_CALLER, 200_000, 0).await;

    let response = app
        .post_json(
            "/chat",
            Some(TEST_CALLER),
            json!({
                "message": "hello",
                "override": { "provider": "anthropic", "model": "claude-3-opus" }
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "anthropic");
    assert_eq!(body["model"], "claude-3-opus");
}

#[tokio::test]
async fn chat_partial_override_keeps_routed_model() {
    let app = TestApp::spawn();
    app.seed_session(TEST_CALLER, 200_000, 0).await;

    let response = app
        .post_json(
            "/chat",
            Some(TEST_CALLER),
            json!({
                "message": "hello",
                "override": { "model": "gpt-4o" }
            }),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "openai");
    assert_eq!(body["model"], "gpt-4o");
}

//! HTTP handlers for gateway-service.

pub mod chat;
pub mod session;
pub mod usage;
pub mod webhook;

use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::metrics;
use crate::AppState;

pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "service": "gateway-service" })),
    )
}

pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => {
            tracing::error!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "not_ready" })),
            )
        }
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    metrics::get_metrics()
}

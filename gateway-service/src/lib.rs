pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;

use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::GatewayConfig;
use services::{ChatService, SessionGrantor, SessionStore};

#[derive(Clone)]
pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<dyn SessionStore>,
    pub chat: Arc<ChatService>,
    pub grantor: Arc<SessionGrantor>,
}

/// Assemble the HTTP router over a prepared state.
///
/// Kept separate from [`startup::Application::build`] so tests can drive the
/// full middleware and handler stack against in-memory backends.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/chat", post(handlers::chat::chat))
        .route("/session", get(handlers::session::session_status))
        .route("/usage", get(handlers::usage::usage_summary))
        .route("/payments/webhook", post(handlers::webhook::payment_webhook))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    caller_id = tracing::field::Empty,
                )
            }),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

//! Test helper module for gateway-service integration tests.
//!
//! Builds the full HTTP stack over in-memory backends: no MongoDB, Redis,
//! or provider network access is required.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use gateway_service::config::{
    GatewayConfig, MongoConfig, ProviderConfig, RateLimitConfig, RedisConfig, RoutingConfig,
    SessionConfig, WebhookConfig,
};
use gateway_service::handlers::webhook::compute_signature;
use gateway_service::models::AccessSession;
use gateway_service::services::metrics::init_metrics;
use gateway_service::services::providers::mock::MockChatProvider;
use gateway_service::services::providers::ProviderSet;
use gateway_service::services::rate_limit::{FixedWindowLimiter, MemoryRateCounter};
use gateway_service::services::store::MemorySessionStore;
use gateway_service::services::{ChatService, ModelRouter, SessionGrantor, SessionStore};
use gateway_service::{build_router, AppState};
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_CALLER: &str = "caller-1";
pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Configuration mirroring the production defaults, pointed at nothing.
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        common: service_core::config::Config {
            port: 0,
            environment: "dev".to_string(),
        },
        mongodb: MongoConfig {
            uri: "mongodb://unused".to_string(),
            database: "unused".to_string(),
        },
        redis: RedisConfig {
            url: "redis://unused".to_string(),
            fail_open: false,
        },
        rate_limit: RateLimitConfig {
            limit: 30,
            window_seconds: 60,
        },
        session: SessionConfig {
            token_limit: 200_000,
            grant_hours: 24,
            precheck_headroom: 2_000,
        },
        routing: RoutingConfig::default(),
        providers: ProviderConfig {
            openai_api_key: Secret::new("test-key".to_string()),
            anthropic_api_key: Secret::new("test-key".to_string()),
        },
        webhook: WebhookConfig {
            secret: Secret::new(TEST_WEBHOOK_SECRET.to_string()),
        },
    }
}

/// Test application wrapper over the in-memory stack.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
    pub config: GatewayConfig,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::spawn_with(test_config(), false)
    }

    pub fn spawn_with_config(config: GatewayConfig) -> Self {
        Self::spawn_with(config, false)
    }

    pub fn spawn_with_failing_provider() -> Self {
        Self::spawn_with(test_config(), true)
    }

    fn spawn_with(config: GatewayConfig, provider_fails: bool) -> Self {
        init_metrics();

        let store = Arc::new(MemorySessionStore::new());
        let store_dyn: Arc<dyn SessionStore> = store.clone();

        let limiter = FixedWindowLimiter::new(
            Arc::new(MemoryRateCounter::new()),
            config.rate_limit.limit,
            config.rate_limit.window_seconds,
            config.redis.fail_open,
        );

        let router_svc = ModelRouter::new(&config.routing).expect("routing patterns must compile");

        let providers = if provider_fails {
            ProviderSet::new(
                Arc::new(MockChatProvider::failing()),
                Arc::new(MockChatProvider::failing()),
            )
        } else {
            ProviderSet::new(
                Arc::new(MockChatProvider::new()),
                Arc::new(MockChatProvider::new()),
            )
        };

        let chat = Arc::new(ChatService::new(
            store_dyn.clone(),
            limiter,
            router_svc,
            providers,
            config.session.precheck_headroom,
        ));

        let grantor = Arc::new(SessionGrantor::new(
            store_dyn.clone(),
            config.session.token_limit,
            config.session.grant_hours,
        ));

        let state = AppState {
            config: config.clone(),
            store: store_dyn,
            chat,
            grantor,
        };

        Self {
            router: build_router(state),
            store,
            config,
        }
    }

    /// Seed an active session and return its id.
    pub async fn seed_session(&self, caller_id: &str, token_limit: i64, tokens_used: i64) -> String {
        let mut session = AccessSession::new(caller_id, token_limit, Duration::hours(24), Utc::now());
        session.tokens_used = tokens_used;
        self.store
            .insert_session(&session)
            .await
            .expect("seeding session");
        session.session_id
    }

    pub async fn get(&self, path: &str, caller: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(path);
        if let Some(caller) = caller {
            builder = builder.header("X-Caller-ID", caller);
        }
        let request = builder.body(Body::empty()).expect("request build");
        self.router.clone().oneshot(request).await.expect("request")
    }

    pub async fn post_json(&self, path: &str, caller: Option<&str>, body: Value) -> Response<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(caller) = caller {
            builder = builder.header("X-Caller-ID", caller);
        }
        let request = builder
            .body(Body::from(body.to_string()))
            .expect("request build");
        self.router.clone().oneshot(request).await.expect("request")
    }

    /// Post a raw webhook body with a signature computed from the test secret.
    pub async fn post_webhook(&self, body: &str) -> Response<Body> {
        let signature =
            compute_signature(body, TEST_WEBHOOK_SECRET).expect("signature computation");
        self.post_webhook_signed(body, &signature).await
    }

    pub async fn post_webhook_signed(&self, body: &str, signature: &str) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri("/payments/webhook")
            .header("content-type", "application/json")
            .header("X-Webhook-Signature", signature)
            .body(Body::from(body.to_string()))
            .expect("request build");
        self.router.clone().oneshot(request).await.expect("request")
    }

    /// Wait for spawned background work (usage records) to settle.
    pub async fn settle(&self) {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub fn assert_status(response: &Response<Body>, expected: StatusCode) {
    assert_eq!(response.status(), expected);
}

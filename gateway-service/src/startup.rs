//! Application assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use service_core::error::AppError;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::services::providers::{AnthropicProvider, OpenAiProvider, ProviderSet};
use crate::services::rate_limit::{FixedWindowLimiter, RedisRateCounter};
use crate::services::store::MongoSessionStore;
use crate::services::{ChatService, ModelRouter, SessionGrantor, SessionStore};
use crate::{build_router, AppState};

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Connect the backing stores, wire the services, and bind the listener.
    ///
    /// Binding here (instead of in `run_until_stopped`) lets callers pass
    /// port 0 and read back the assigned port.
    pub async fn build(config: GatewayConfig) -> Result<Self, AppError> {
        let store =
            MongoSessionStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
        store.initialize_indexes().await?;
        let store: Arc<dyn SessionStore> = Arc::new(store);

        let counter = RedisRateCounter::connect(&config.redis.url).await?;
        let limiter = FixedWindowLimiter::new(
            Arc::new(counter),
            config.rate_limit.limit,
            config.rate_limit.window_seconds,
            config.redis.fail_open,
        );

        let router_svc = ModelRouter::new(&config.routing)?;

        let providers = ProviderSet::new(
            Arc::new(OpenAiProvider::new(config.providers.openai_api_key.clone())),
            Arc::new(AnthropicProvider::new(
                config.providers.anthropic_api_key.clone(),
            )),
        );

        let chat = Arc::new(ChatService::new(
            store.clone(),
            limiter,
            router_svc,
            providers,
            config.session.precheck_headroom,
        ));

        let grantor = Arc::new(SessionGrantor::new(
            store.clone(),
            config.session.token_limit,
            config.session.grant_hours,
        ));

        let state = AppState {
            config: config.clone(),
            store,
            chat,
            grantor,
        };

        let router = build_router(state);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!(port = self.port, "Gateway listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

//! Upstream chat provider abstractions and implementations.
//!
//! A trait-based seam so the two production backends (OpenAI, Anthropic)
//! and the test double are interchangeable behind the router's choice.

pub mod anthropic;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use mock::MockChatProvider;
pub use openai::OpenAiProvider;

use crate::services::router::Provider;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Empty response from provider")]
    EmptyResponse,
}

/// A completed upstream exchange.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub text: String,
    pub latency_ms: i64,
}

/// Trait for single-turn chat providers.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn ask(&self, prompt: &str, model: &str) -> Result<ChatReply, ProviderError>;
}

/// The gateway's two configured backends, indexed by routed provider.
#[derive(Clone)]
pub struct ProviderSet {
    openai: Arc<dyn ChatProvider>,
    anthropic: Arc<dyn ChatProvider>,
}

impl ProviderSet {
    pub fn new(openai: Arc<dyn ChatProvider>, anthropic: Arc<dyn ChatProvider>) -> Self {
        Self { openai, anthropic }
    }

    pub fn get(&self, provider: Provider) -> &Arc<dyn ChatProvider> {
        match provider {
            Provider::OpenAi => &self.openai,
            Provider::Anthropic => &self.anthropic,
        }
    }
}

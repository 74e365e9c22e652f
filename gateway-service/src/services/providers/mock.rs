//! Mock provider for tests.

use super::{ChatProvider, ChatReply, ProviderError};
use async_trait::async_trait;

/// Deterministic test double.
///
/// By default echoes the prompt back in a fixed template; `with_reply`
/// pins an exact response (useful for token-accounting assertions) and
/// `failing` simulates an upstream outage.
pub struct MockChatProvider {
    reply: Option<String>,
    fail: bool,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self {
            reply: None,
            fail: false,
        }
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            fail: true,
        }
    }
}

impl Default for MockChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn ask(&self, prompt: &str, _model: &str) -> Result<ChatReply, ProviderError> {
        if self.fail {
            return Err(ProviderError::Api("mock provider outage".to_string()));
        }

        let text = self
            .reply
            .clone()
            .unwrap_or_else(|| format!("Mock reply for: {}", prompt));

        Ok(ChatReply {
            text,
            latency_ms: 1,
        })
    }
}

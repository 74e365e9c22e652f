//! Anthropic messages provider.

use super::{ChatProvider, ChatReply, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Instant;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    api_key: Secret<String>,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: Secret<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self { api_key, client }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn ask(&self, prompt: &str, model: &str) -> Result<ChatReply, ProviderError> {
        let request = MessagesRequest {
            model,
            max_tokens: MAX_OUTPUT_TOKENS,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!(model = %model, prompt_len = prompt.len(), "Sending request to Anthropic");

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/messages", ANTHROPIC_API_BASE))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Anthropic API error");
            return Err(ProviderError::Api(format!("status {}: {}", status, body)));
        }

        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed response: {}", e)))?;

        let text: String = message
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(ChatReply {
            text,
            latency_ms: started.elapsed().as_millis() as i64,
        })
    }
}

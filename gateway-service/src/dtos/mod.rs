use crate::services::router::RouteOverride;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, message = "message must not be empty"))]
    pub message: String,
    #[serde(default, rename = "override")]
    pub route_override: Option<RouteOverride>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_remaining: Option<i64>,
}

impl SessionStatusResponse {
    pub fn inactive() -> Self {
        Self {
            active: false,
            session_id: None,
            ends_at: None,
            tokens_used: None,
            token_limit: None,
            tokens_remaining: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub total_requests: i64,
    pub total_tokens: i64,
    pub by_model: std::collections::HashMap<String, i64>,
    /// Most recent records, newest first.
    pub records: Vec<crate::models::UsageRecord>,
}

/// Payment notification delivered by the billing provider's webhook.
#[derive(Debug, Deserialize)]
pub struct PaymentEvent {
    pub transaction_id: String,
    pub caller_id: String,
    pub amount_cents: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub status: String,
}

fn default_currency() -> String {
    "usd".to_string()
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

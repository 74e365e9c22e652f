//! Immutable usage records for billing analytics and audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One completed, quota-committed exchange.
///
/// Created exactly once per successful commit; never updated or deleted by
/// the gateway. Billing correctness is governed by the quota ledger, not by
/// these records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Record ID for correlation.
    pub record_id: String,

    /// Caller who made the request.
    pub caller_id: String,

    /// Session the tokens were committed against.
    pub session_id: String,

    /// Upstream provider that served the request.
    pub provider: String,

    /// Model that was used.
    pub model: String,

    /// Prompt size in characters.
    pub prompt_chars: i64,

    /// Response size in characters.
    pub response_chars: i64,

    /// Estimated tokens committed to the session.
    pub est_tokens: i64,

    /// Upstream call latency.
    pub latency_ms: i64,

    /// When the exchange completed.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller_id: String,
        session_id: String,
        provider: String,
        model: String,
        prompt_chars: i64,
        response_chars: i64,
        est_tokens: i64,
        latency_ms: i64,
    ) -> Self {
        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            caller_id,
            session_id,
            provider,
            model,
            prompt_chars,
            response_chars,
            est_tokens,
            latency_ms,
            created_at: Utc::now(),
        }
    }
}

/// Aggregated usage statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageStats {
    /// Total estimated tokens.
    pub total_tokens: i64,

    /// Total completed requests.
    pub total_requests: i64,

    /// Tokens by model.
    pub by_model: HashMap<String, i64>,
}

impl UsageStats {
    /// Aggregate usage records into statistics.
    pub fn from_records(records: &[UsageRecord]) -> Self {
        let mut stats = UsageStats::default();

        for record in records {
            stats.total_tokens += record.est_tokens;
            stats.total_requests += 1;
            *stats.by_model.entry(record.model.clone()).or_insert(0) += record.est_tokens;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(model: &str, tokens: i64) -> UsageRecord {
        UsageRecord::new(
            "caller-1".to_string(),
            "session-1".to_string(),
            "openai".to_string(),
            model.to_string(),
            100,
            400,
            tokens,
            250,
        )
    }

    #[test]
    fn stats_aggregate_by_model() {
        let records = vec![
            record("gpt-4o-mini", 120),
            record("gpt-4o-mini", 80),
            record("claude-3-5-sonnet-20241022", 500),
        ];

        let stats = UsageStats::from_records(&records);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.total_tokens, 700);
        assert_eq!(stats.by_model["gpt-4o-mini"], 200);
        assert_eq!(stats.by_model["claude-3-5-sonnet-20241022"], 500);
    }
}

//! The admission-control + routing + accounting pipeline.
//!
//! Per request: rate limit -> session pre-check -> route -> upstream call
//! -> estimate -> atomic commit -> usage record. The rate-limit charge is
//! applied before the upstream call and is not refunded on failure, so
//! retry storms cannot bypass the limiter. Only the commit is
//! authoritative for quota; the pre-check merely avoids paying for calls
//! that are almost certain to be rejected.

use crate::models::UsageRecord;
use crate::services::metrics;
use crate::services::providers::ProviderSet;
use crate::services::rate_limit::FixedWindowLimiter;
use crate::services::router::{ModelRouter, Provider, RouteOverride};
use crate::services::store::{CommitOutcome, SessionStore};
use crate::services::tokens::estimate_tokens;
use chrono::Utc;
use service_core::error::AppError;
use std::sync::Arc;

/// A successful, quota-committed exchange.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub reply: String,
    pub provider: Provider,
    pub model: String,
}

pub struct ChatService {
    store: Arc<dyn SessionStore>,
    limiter: FixedWindowLimiter,
    router: ModelRouter,
    providers: ProviderSet,
    precheck_headroom: i64,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        limiter: FixedWindowLimiter,
        router: ModelRouter,
        providers: ProviderSet,
        precheck_headroom: i64,
    ) -> Self {
        Self {
            store,
            limiter,
            router,
            providers,
            precheck_headroom,
        }
    }

    pub async fn handle(
        &self,
        caller_id: &str,
        message: &str,
        route_override: Option<&RouteOverride>,
    ) -> Result<ChatOutcome, AppError> {
        // Rate limit, charged up front
        let decision = self.limiter.allow(caller_id).await?;
        if !decision.allowed {
            metrics::record_request("rate_limited");
            return Err(AppError::TooManyRequests(
                "Rate limited. Slow down.".to_string(),
                decision.retry_after_secs,
            ));
        }

        // Session gate: live session plus an advisory headroom pre-check
        let now = Utc::now();
        let session = self
            .store
            .find_active_session(caller_id, now)
            .await?
            .ok_or_else(|| {
                metrics::record_request("no_active_session");
                AppError::NoActiveSession
            })?;

        if session.tokens_used + self.precheck_headroom > session.token_limit {
            metrics::record_request("quota_exhausted");
            return Err(AppError::QuotaExhausted);
        }

        // Route, then merge any caller override into a fresh choice
        let choice = self.router.choose(message);
        let choice = match route_override {
            Some(ovr) => choice.with_override(ovr),
            None => choice,
        };

        tracing::debug!(
            caller_id = %caller_id,
            provider = %choice.provider,
            model = %choice.model,
            reason = %choice.reason,
            "Routed chat request"
        );

        // Upstream call. On failure the rate-limit charge stands but quota
        // is untouched; the caller may resubmit.
        let provider = self.providers.get(choice.provider);
        let reply = provider.ask(message, &choice.model).await.map_err(|e| {
            tracing::warn!(
                caller_id = %caller_id,
                provider = %choice.provider,
                error = %e,
                "Upstream provider call failed"
            );
            metrics::record_request("upstream_failure");
            AppError::UpstreamFailure(e.to_string())
        })?;

        // Authoritative accounting against the stored session
        let est_tokens = estimate_tokens(message) + estimate_tokens(&reply.text);
        match self.store.commit_tokens(&session.session_id, est_tokens).await? {
            CommitOutcome::Committed { new_total } => {
                tracing::debug!(
                    session_id = %session.session_id,
                    est_tokens,
                    new_total,
                    "Committed token usage"
                );
                metrics::record_tokens(&choice.provider.to_string(), est_tokens);
            }
            CommitOutcome::Exhausted => {
                // The response was generated but will not be billed as
                // usable: the operator absorbs one worst-case exchange of
                // upstream cost rather than overrunning the budget.
                tracing::warn!(
                    session_id = %session.session_id,
                    est_tokens,
                    "Commit rejected, session quota exhausted"
                );
                metrics::record_request("quota_exhausted");
                return Err(AppError::QuotaExhausted);
            }
        }

        metrics::record_request("admitted");

        // Usage record: fire-and-forget, never blocks the reply and never
        // rolls back the commit
        let record = UsageRecord::new(
            caller_id.to_string(),
            session.session_id.clone(),
            choice.provider.to_string(),
            choice.model.clone(),
            message.chars().count() as i64,
            reply.text.chars().count() as i64,
            est_tokens,
            reply.latency_ms,
        );
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.record_usage(&record).await {
                tracing::warn!(error = %e, "Failed to append usage record");
            }
        });

        Ok(ChatOutcome {
            reply: reply.text,
            provider: choice.provider,
            model: choice.model,
        })
    }
}

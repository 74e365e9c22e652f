//! Session grants driven by confirmed payments.

use crate::models::AccessSession;
use crate::services::store::SessionStore;
use chrono::{Duration, Utc};
use service_core::error::AppError;
use std::sync::Arc;

/// How a payment was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Created,
    Extended,
}

pub struct SessionGrantor {
    store: Arc<dyn SessionStore>,
    token_limit: i64,
    grant: Duration,
}

impl SessionGrantor {
    pub fn new(store: Arc<dyn SessionStore>, token_limit: i64, grant_hours: i64) -> Self {
        Self {
            store,
            token_limit,
            grant: Duration::hours(grant_hours),
        }
    }

    /// Apply one confirmed payment: extend the live session's expiry by one
    /// grant period on top of its current `ends_at` (sequential purchases
    /// concatenate access), or start a fresh session when none is live.
    ///
    /// Must be invoked at most once per unique payment; duplicate webhook
    /// deliveries are suppressed by the unique payment-record insert before
    /// this runs.
    pub async fn grant_or_extend(
        &self,
        caller_id: &str,
    ) -> Result<(AccessSession, GrantOutcome), AppError> {
        let now = Utc::now();

        if let Some(extended) = self.store.extend_session(caller_id, self.grant, now).await? {
            tracing::info!(
                caller_id = %caller_id,
                session_id = %extended.session_id,
                ends_at = %extended.ends_at,
                "Extended access session"
            );
            return Ok((extended, GrantOutcome::Extended));
        }

        // No live session: retire any stale active rows, then start fresh
        self.store.expire_stale_sessions(caller_id, now).await?;

        let session = AccessSession::new(caller_id, self.token_limit, self.grant, now);
        self.store.insert_session(&session).await?;

        tracing::info!(
            caller_id = %caller_id,
            session_id = %session.session_id,
            ends_at = %session.ends_at,
            token_limit = self.token_limit,
            "Created access session"
        );

        Ok((session, GrantOutcome::Created))
    }
}

//! Access session model: a time-boxed, token-budgeted grant of access.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle status.
///
/// Sessions are never deleted. A session stops admitting requests the
/// moment its `ends_at` passes; the stored status flips to `Expired`
/// lazily, when a successor session is created for the same caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Expired,
}

/// A purchased access session.
///
/// `tokens_used` is mutated exclusively through the conditional commit in
/// the session store; it is monotonically non-decreasing and never exceeds
/// `token_limit` in any committed read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessSession {
    /// Unique session identifier.
    pub session_id: String,

    /// Opaque authenticated caller id (from the identity proxy).
    pub caller_id: String,

    /// Lifecycle status.
    pub status: SessionStatus,

    /// When access begins.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub starts_at: DateTime<Utc>,

    /// Absolute expiry; strictly after `starts_at`.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub ends_at: DateTime<Utc>,

    /// Cumulative tokens committed against this session.
    pub tokens_used: i64,

    /// Fixed per-session token budget.
    pub token_limit: i64,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

impl AccessSession {
    /// Create a fresh session starting at `now`.
    pub fn new(caller_id: &str, token_limit: i64, grant: Duration, now: DateTime<Utc>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            caller_id: caller_id.to_string(),
            status: SessionStatus::Active,
            starts_at: now,
            ends_at: now + grant,
            tokens_used: 0,
            token_limit,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session admits requests at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && self.ends_at > now
    }

    /// Remaining token allowance.
    pub fn remaining_tokens(&self) -> i64 {
        (self.token_limit - self.tokens_used).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_live_until_ends_at() {
        let now = Utc::now();
        let session = AccessSession::new("caller-1", 200_000, Duration::hours(24), now);

        assert!(session.is_live(now));
        assert!(session.is_live(now + Duration::hours(23)));
        assert!(!session.is_live(now + Duration::hours(25)));
        assert_eq!(session.remaining_tokens(), 200_000);
        assert!(session.ends_at > session.starts_at);
    }
}

//! Fixed-window rate limiting backed by a shared atomic counter store.
//!
//! The window counter lives in Redis so every gateway replica enforces the
//! same limit. The increment and the first-hit expiry MUST happen in one
//! atomic step; a Lua script keeps concurrent callers from leaking a key
//! without a TTL or undercounting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::Client;
use service_core::error::AppError;
use std::sync::Arc;

/// Atomic windowed counter primitive.
#[async_trait]
pub trait RateCounter: Send + Sync {
    /// Increment the counter for `key`, setting its expiry to `ttl_seconds`
    /// when the key is created. Atomic with respect to concurrent callers.
    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, AppError>;
}

const INCR_EXPIRE_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Redis-backed counter using a single scripted INCR + conditional EXPIRE.
#[derive(Clone)]
pub struct RedisRateCounter {
    manager: ConnectionManager,
    script: redis::Script,
}

impl RedisRateCounter {
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        tracing::info!(url = %url, "Connecting to Redis");
        let client = Client::open(url)?;

        // ConnectionManager handles reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            AppError::RedisError(e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            manager,
            script: redis::Script::new(INCR_EXPIRE_SCRIPT),
        })
    }
}

#[async_trait]
impl RateCounter for RedisRateCounter {
    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, AppError> {
        let mut conn = self.manager.clone();
        let count: i64 = self
            .script
            .key(key)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}

/// In-process counter for tests. Keys already carry the window index, so
/// expiry is irrelevant to correctness; stale buckets are simply never read
/// again.
#[derive(Default)]
pub struct MemoryRateCounter {
    counters: DashMap<String, i64>,
}

impl MemoryRateCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCounter for MemoryRateCounter {
    async fn incr_with_ttl(&self, key: &str, _ttl_seconds: u64) -> Result<i64, AppError> {
        let mut entry = self.counters.entry(key.to_string()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: i64,
    /// Seconds until the current window rolls over; set when denied.
    pub retry_after_secs: Option<u64>,
}

/// Fixed-window limiter keyed by caller id and window index.
///
/// If the counter store is unreachable the limiter fails closed: the
/// monetary risk of unmetered usage outweighs availability for a paid
/// quota system. `fail_open` relaxes this for non-production deployments.
pub struct FixedWindowLimiter {
    counter: Arc<dyn RateCounter>,
    limit: i64,
    window_seconds: u64,
    fail_open: bool,
}

impl FixedWindowLimiter {
    pub fn new(counter: Arc<dyn RateCounter>, limit: i64, window_seconds: u64, fail_open: bool) -> Self {
        Self {
            counter,
            limit,
            window_seconds: window_seconds.max(1),
            fail_open,
        }
    }

    pub async fn allow(&self, caller_id: &str) -> Result<RateLimitDecision, AppError> {
        self.allow_at(caller_id, Utc::now()).await
    }

    /// Check the window containing `now`. Split out so tests can pin the
    /// window boundary.
    pub async fn allow_at(
        &self,
        caller_id: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, AppError> {
        let bucket = now.timestamp().div_euclid(self.window_seconds as i64);
        let key = format!("rl:{}:{}", caller_id, bucket);

        let count = match self.counter.incr_with_ttl(&key, self.window_seconds).await {
            Ok(count) => count,
            Err(e) if self.fail_open => {
                tracing::warn!(error = %e, caller_id = %caller_id, "Rate counter unreachable, failing open");
                return Ok(RateLimitDecision {
                    allowed: true,
                    remaining: self.limit,
                    retry_after_secs: None,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, caller_id = %caller_id, "Rate counter unreachable, failing closed");
                return Err(e);
            }
        };

        let allowed = count <= self.limit;
        let retry_after_secs = if allowed {
            None
        } else {
            let elapsed = now.timestamp().rem_euclid(self.window_seconds as i64) as u64;
            Some(self.window_seconds - elapsed)
        };

        Ok(RateLimitDecision {
            allowed,
            remaining: (self.limit - count).max(0),
            retry_after_secs,
        })
    }
}

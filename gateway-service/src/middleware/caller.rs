//! Caller identification middleware.
//!
//! Extracts the caller identity from the X-Caller-ID header. The header is
//! set by the edge proxy after authenticating the API key; a request that
//! reaches this service without it is unauthenticated.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

/// Caller context extracted from request headers.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub caller_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller_id = parts
            .headers
            .get("X-Caller-ID")
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-Caller-ID header")))?;

        // Add to tracing span for observability
        let span = tracing::Span::current();
        span.record("caller_id", caller_id);

        Ok(CallerContext {
            caller_id: caller_id.to_string(),
        })
    }
}

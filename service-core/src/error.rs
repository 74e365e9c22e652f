use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error taxonomy for the gateway.
///
/// Every admission-control rejection maps to a stable machine-readable
/// `reason` code so a client can distinguish "buy more access" from
/// "slow down" from "try again later".
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(anyhow::Error),

    #[error("No active session")]
    NoActiveSession,

    #[error("Token allowance reached")]
    QuotaExhausted,

    #[error("Too many requests: {0}")]
    TooManyRequests(String, Option<u64>),

    #[error("Upstream provider failure: {0}")]
    UpstreamFailure(String),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<mongodb::error::Error> for AppError {
    fn from(err: mongodb::error::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            reason: &'static str,
        }

        let (status, error_message, reason, retry_after) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                err.to_string(),
                "invalid_request",
                None,
            ),
            AppError::BadRequest(err) => {
                (StatusCode::BAD_REQUEST, err.to_string(), "bad_request", None)
            }
            AppError::NotFound(err) => {
                (StatusCode::NOT_FOUND, err.to_string(), "not_found", None)
            }
            AppError::Unauthorized(err) => (
                StatusCode::UNAUTHORIZED,
                err.to_string(),
                "unauthenticated",
                None,
            ),
            AppError::NoActiveSession => (
                StatusCode::PAYMENT_REQUIRED,
                "No active session".to_string(),
                "no_active_session",
                None,
            ),
            AppError::QuotaExhausted => (
                StatusCode::PAYMENT_REQUIRED,
                "Token allowance reached".to_string(),
                "quota_exhausted",
                None,
            ),
            AppError::TooManyRequests(msg, retry) => {
                (StatusCode::TOO_MANY_REQUESTS, msg, "rate_limited", retry)
            }
            AppError::UpstreamFailure(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Upstream provider failure: {}", msg),
                "upstream_failure",
                None,
            ),
            AppError::InternalError(err) => {
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal_error",
                    None,
                )
            }
            AppError::DatabaseError(err) => {
                tracing::error!(error = %err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal_error",
                    None,
                )
            }
            AppError::RedisError(err) => {
                tracing::error!(error = %err, "Redis error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal_error",
                    None,
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error".to_string(),
                    "internal_error",
                    None,
                )
            }
        };

        let mut res = (
            status,
            Json(ErrorResponse {
                error: error_message,
                reason,
            }),
        )
            .into_response();

        if let Some(retry) = retry_after {
            res.headers_mut()
                .insert(axum::http::header::RETRY_AFTER, retry.into());
        }

        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_exhausted_maps_to_402() {
        let res = AppError::QuotaExhausted.into_response();
        assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let res = AppError::TooManyRequests("slow down".to_string(), Some(42)).into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            res.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "42"
        );
    }
}

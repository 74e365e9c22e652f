//! Session status endpoint.

use axum::{extract::State, Json};
use chrono::Utc;
use service_core::error::AppError;

use crate::dtos::SessionStatusResponse;
use crate::middleware::CallerContext;
use crate::AppState;

pub async fn session_status(
    State(state): State<AppState>,
    caller: CallerContext,
) -> Result<Json<SessionStatusResponse>, AppError> {
    let now = Utc::now();
    let session = state.store.find_active_session(&caller.caller_id, now).await?;

    let response = match session {
        Some(s) => SessionStatusResponse {
            active: true,
            session_id: Some(s.session_id.clone()),
            ends_at: Some(s.ends_at),
            tokens_used: Some(s.tokens_used),
            token_limit: Some(s.token_limit),
            tokens_remaining: Some(s.remaining_tokens()),
        },
        None => SessionStatusResponse::inactive(),
    };

    Ok(Json(response))
}

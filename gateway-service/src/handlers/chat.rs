//! Chat endpoint: the metered path through the gateway.

use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::{ChatRequest, ChatResponse};
use crate::middleware::CallerContext;
use crate::AppState;

pub async fn chat(
    State(state): State<AppState>,
    caller: CallerContext,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    payload.validate()?;

    tracing::info!(
        caller_id = %caller.caller_id,
        message_chars = payload.message.chars().count(),
        "Handling chat request"
    );

    let outcome = state
        .chat
        .handle(
            &caller.caller_id,
            &payload.message,
            payload.route_override.as_ref(),
        )
        .await?;

    Ok(Json(ChatResponse {
        reply: outcome.reply,
        provider: outcome.provider.to_string(),
        model: outcome.model,
    }))
}

//! Usage summary endpoint.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::UsageResponse;
use crate::middleware::CallerContext;
use crate::models::UsageStats;
use crate::AppState;

const USAGE_QUERY_LIMIT: i64 = 1_000;
const USAGE_RESPONSE_RECORDS: usize = 50;

pub async fn usage_summary(
    State(state): State<AppState>,
    caller: CallerContext,
) -> Result<Json<UsageResponse>, AppError> {
    let records = state
        .store
        .list_usage(&caller.caller_id, USAGE_QUERY_LIMIT)
        .await?;

    let stats = UsageStats::from_records(&records);

    let mut recent = records;
    recent.truncate(USAGE_RESPONSE_RECORDS);

    Ok(Json(UsageResponse {
        total_requests: stats.total_requests,
        total_tokens: stats.total_tokens,
        by_model: stats.by_model,
        records: recent,
    }))
}

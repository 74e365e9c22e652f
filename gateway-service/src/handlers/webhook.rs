//! Payment webhook handler.
//!
//! The billing provider posts payment events here. Each delivery is
//! authenticated with an HMAC-SHA256 signature over the raw body, carried
//! hex-encoded in the `X-Webhook-Signature` header. Duplicate deliveries of
//! the same transaction are acknowledged without granting twice.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use sha2::Sha256;

use crate::dtos::{PaymentEvent, WebhookResponse};
use crate::models::PaymentRecord;
use crate::services::metrics;
use crate::services::store::PaymentInsert;
use crate::services::GrantOutcome;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature of a webhook body.
pub fn compute_signature(body: &str, secret: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::InternalError(anyhow::anyhow!("Invalid webhook key length")))?;
    mac.update(body.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<WebhookResponse>), AppError> {
    let signature = headers
        .get("X-Webhook-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing X-Webhook-Signature header");
            AppError::Unauthorized(anyhow::anyhow!("Missing webhook signature"))
        })?;

    let expected = compute_signature(&body, state.config.webhook.secret.expose_secret())?;
    if expected != signature {
        tracing::warn!("Invalid webhook signature");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Invalid webhook signature"
        )));
    }

    let event: PaymentEvent = serde_json::from_str(&body).map_err(|e| {
        tracing::error!(error = %e, "Failed to parse webhook payload");
        AppError::BadRequest(anyhow::anyhow!("Invalid webhook payload"))
    })?;

    tracing::info!(
        transaction_id = %event.transaction_id,
        caller_id = %event.caller_id,
        status = %event.status,
        amount_cents = event.amount_cents,
        "Processing payment webhook"
    );

    // Only successful payments grant access; everything else is acknowledged
    // so the provider stops retrying.
    if event.status != "succeeded" {
        metrics::record_payment("ignored");
        return Ok((
            StatusCode::OK,
            Json(WebhookResponse {
                received: true,
                duplicate: None,
                session_id: None,
            }),
        ));
    }

    let record = PaymentRecord::new(
        event.transaction_id.clone(),
        event.caller_id.clone(),
        event.amount_cents,
        event.currency.clone(),
    );

    // Idempotency gate: the unique index on transaction_id makes redelivered
    // events no-ops before any grant happens.
    match state.store.insert_payment(&record).await? {
        PaymentInsert::Duplicate => {
            tracing::info!(
                transaction_id = %event.transaction_id,
                "Duplicate payment delivery, no grant applied"
            );
            metrics::record_payment("duplicate");
            Ok((
                StatusCode::OK,
                Json(WebhookResponse {
                    received: true,
                    duplicate: Some(true),
                    session_id: None,
                }),
            ))
        }
        PaymentInsert::Recorded => {
            let (session, outcome) = state.grantor.grant_or_extend(&event.caller_id).await?;
            metrics::record_payment(match outcome {
                GrantOutcome::Created => "granted",
                GrantOutcome::Extended => "extended",
            });
            Ok((
                StatusCode::OK,
                Json(WebhookResponse {
                    received: true,
                    duplicate: None,
                    session_id: Some(session.session_id),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_hmac_sha256() {
        let sig = compute_signature("{}", "test-secret").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));

        // Deterministic for the same body and key
        assert_eq!(sig, compute_signature("{}", "test-secret").unwrap());
        // Different key, different signature
        assert_ne!(sig, compute_signature("{}", "other-secret").unwrap());
    }
}

//! Payment records consumed from the billing webhook.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

/// A confirmed payment event as recorded by the gateway.
///
/// `transaction_id` carries the payment provider's external transaction
/// identifier and is covered by a unique index: inserting a duplicate is
/// how repeated webhook deliveries are suppressed before any session grant
/// can run twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// External transaction identifier from the payment provider.
    pub transaction_id: String,

    /// Caller the payment grants access to.
    pub caller_id: String,

    /// Amount in the smallest currency unit.
    pub amount_cents: i64,

    /// Currency code (e.g., "USD").
    pub currency: String,

    pub status: PaymentStatus,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(transaction_id: String, caller_id: String, amount_cents: i64, currency: String) -> Self {
        Self {
            transaction_id,
            caller_id,
            amount_cents,
            currency,
            status: PaymentStatus::Succeeded,
            created_at: Utc::now(),
        }
    }
}

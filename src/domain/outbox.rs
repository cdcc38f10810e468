use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PAYMENT_COMPLETED: &str = "payment.completed";

#[derive(Debug, Clone)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub kind: String,
    pub payload: serde_json::Value,
    pub idempotency_key: String,
}

/// Payload of a `payment.completed` event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCompleted {
    pub payment_id: Uuid,
    pub invoice_id: Uuid,
    pub order_id: String,
    pub paid_at: DateTime<Utc>,
}

impl PaymentCompleted {
    pub fn into_event(self, idempotency_key: String) -> serde_json::Result<NewOutboxEvent> {
        Ok(NewOutboxEvent {
            kind: PAYMENT_COMPLETED.to_string(),
            payload: serde_json::to_value(self)?,
            idempotency_key,
        })
    }
}

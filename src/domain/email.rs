use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    PaymentConfirmation,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::PaymentConfirmation => "payment_confirmation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "payment_confirmation" => Some(EmailKind::PaymentConfirmation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmailPriority {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmailJobStatus {
    Pending,
    Sent,
    Failed,
}

/// A queued email: `{type, priority, data}` plus addressing.
#[derive(Debug, Clone)]
pub struct EmailJob {
    pub id: Uuid,
    pub kind: EmailKind,
    pub priority: EmailPriority,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub data: serde_json::Value,
    pub dedup_key: String,
    pub status: EmailJobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailJob {
    pub kind: EmailKind,
    pub priority: EmailPriority,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub data: serde_json::Value,
    pub dedup_key: String,
}

/// Field bag of a `payment_confirmation` email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentConfirmationData {
    pub client_name: String,
    pub invoice_number: String,
    pub amount: String,
    pub currency: String,
    pub project_title: String,
    pub payment_method: String,
    pub paid_date: String,
    pub dashboard_url: String,
}

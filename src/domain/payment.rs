use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub order_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Whether a gateway update may move a payment from `self` to `next`.
    ///
    /// Completed payments can only be refunded and refunds are final. Every
    /// other state accepts whatever the gateway reports.
    pub fn accepts(self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Completed => next == PaymentStatus::Refunded,
            PaymentStatus::Refunded => false,
            _ => true,
        }
    }

    pub fn transition_to(self, next: PaymentStatus) -> Transition {
        let settled = matches!(self, PaymentStatus::Completed | PaymentStatus::Refunded);
        if settled && self == next {
            Transition::Redelivered
        } else if self.accepts(next) {
            Transition::Apply
        } else {
            Transition::Stale
        }
    }
}

/// How a reported status relates to the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    /// The payment already settled in this state.
    Redelivered,
    /// The report cannot follow the recorded state.
    Stale,
}

/// Transaction status vocabulary reported by the payment gateway.
///
/// The vocabulary is open, unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Refund,
    Other(String),
}

impl GatewayStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "capture" => GatewayStatus::Capture,
            "settlement" => GatewayStatus::Settlement,
            "pending" => GatewayStatus::Pending,
            "deny" => GatewayStatus::Deny,
            "cancel" => GatewayStatus::Cancel,
            "expire" => GatewayStatus::Expire,
            "refund" => GatewayStatus::Refund,
            _ => GatewayStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GatewayStatus::Capture => "capture",
            GatewayStatus::Settlement => "settlement",
            GatewayStatus::Pending => "pending",
            GatewayStatus::Deny => "deny",
            GatewayStatus::Cancel => "cancel",
            GatewayStatus::Expire => "expire",
            GatewayStatus::Refund => "refund",
            GatewayStatus::Other(raw) => raw,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            GatewayStatus::Capture | GatewayStatus::Settlement => PaymentStatus::Completed,
            GatewayStatus::Pending => PaymentStatus::Pending,
            GatewayStatus::Deny | GatewayStatus::Cancel | GatewayStatus::Expire => {
                PaymentStatus::Failed
            }
            GatewayStatus::Refund => PaymentStatus::Refunded,
            GatewayStatus::Other(_) => PaymentStatus::Processing,
        }
    }
}

/// Authoritative transaction state as returned by the gateway status API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionState {
    pub transaction_status: String,
    pub payment_type: Option<String>,
    pub transaction_id: Option<String>,
}

/// Fields written to a payment row by a gateway update.
#[derive(Debug, Clone)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Formats minor units as `"IDR 150,000.00"`.
pub fn format_amount(amount_cents: i64, currency: &str) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let cents = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{} {}{}.{:02}", currency, sign, grouped, cents)
}

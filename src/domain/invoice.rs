use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::PaymentStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub project_id: Uuid,
    pub client_id: Uuid,
    pub amount_cents: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum InvoiceStatus {
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

/// Change to apply to an invoice as a consequence of a payment update.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceChange {
    pub status: InvoiceStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl InvoiceChange {
    /// Derives the invoice side of a payment transition.
    ///
    /// Only a completed payment touches the invoice; every other payment
    /// status leaves the invoice row as it is, so a failed attempt can be
    /// retried against the same invoice.
    pub fn for_payment(status: PaymentStatus, resolved_at: DateTime<Utc>) -> Option<Self> {
        match status {
            PaymentStatus::Completed => Some(Self {
                status: InvoiceStatus::Paid,
                paid_at: Some(resolved_at),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_completed_payment_changes_invoice() {
        let now = Utc::now();
        let change = InvoiceChange::for_payment(PaymentStatus::Completed, now).unwrap();
        assert_eq!(change.status, InvoiceStatus::Paid);
        assert_eq!(change.paid_at, Some(now));

        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
        ] {
            assert!(InvoiceChange::for_payment(status, now).is_none());
        }
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{InvoiceChange, NewOutboxEvent, Payment, PaymentStatus, PaymentUpdate},
    error::{AppError, Result},
    repository::{invoice_repository, outbox_repository, PaymentRepository},
};

const PAYMENT_COLUMNS: &str = r#"
    id, invoice_id, order_id, amount_cents, currency, status,
    payment_method, gateway_transaction_id, paid_at, created_at, updated_at
"#;

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    invoice_id: String,
    order_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    payment_method: Option<String>,
    gateway_transaction_id: Option<String>,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            invoice_id: Uuid::parse_str(&row.invoice_id).map_err(|e| AppError::Database(e.to_string()))?,
            order_id: row.order_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: Self::parse_payment_status(&row.status)?,
            payment_method: row.payment_method,
            gateway_transaction_id: row.gateway_transaction_id,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_payment_status(s: &str) -> Result<PaymentStatus> {
        match s {
            "Pending" => Ok(PaymentStatus::Pending),
            "Processing" => Ok(PaymentStatus::Processing),
            "Completed" => Ok(PaymentStatus::Completed),
            "Failed" => Ok(PaymentStatus::Failed),
            "Refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(AppError::Database(format!("Invalid payment status: {}", s))),
        }
    }

    fn payment_status_to_str(status: PaymentStatus) -> &'static str {
        match status {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Processing => "Processing",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, invoice_id, order_id, amount_cents, currency, status,
                payment_method, gateway_transaction_id, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(payment.id.to_string())
        .bind(payment.invoice_id.to_string())
        .bind(&payment.order_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(Self::payment_status_to_str(payment.status))
        .bind(&payment.payment_method)
        .bind(&payment.gateway_transaction_id)
        .bind(payment.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {} FROM payments WHERE order_id = ?", PAYMENT_COLUMNS);
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn apply_gateway_update(
        &self,
        payment: &Payment,
        update: PaymentUpdate,
        invoice_change: Option<InvoiceChange>,
        event: Option<NewOutboxEvent>,
    ) -> Result<Option<Payment>> {
        let now = Utc::now().naive_utc();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                payment_method = COALESCE(?, payment_method),
                gateway_transaction_id = COALESCE(?, gateway_transaction_id),
                paid_at = COALESCE(?, paid_at),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(Self::payment_status_to_str(update.status))
        .bind(&update.payment_method)
        .bind(&update.gateway_transaction_id)
        .bind(update.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(payment.id.to_string())
        .bind(Self::payment_status_to_str(payment.status))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(change) = invoice_change {
            invoice_repository::apply_change(&mut *tx, payment.invoice_id, &change).await?;
        }

        if let Some(event) = event {
            let inserted = outbox_repository::insert_event(&mut *tx, &event).await?;
            if !inserted {
                tracing::debug!(
                    idempotency_key = %event.idempotency_key,
                    "Outbox event already recorded"
                );
            }
        }

        tx.commit().await?;

        self.find_by_id(payment.id).await?.map(Some).ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })
    }
}

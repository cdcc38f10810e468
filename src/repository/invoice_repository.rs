use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Invoice, InvoiceChange, InvoiceStatus},
    error::{AppError, Result},
    repository::InvoiceRepository,
};

#[derive(FromRow)]
struct InvoiceRow {
    id: String,
    invoice_number: String,
    project_id: String,
    client_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    due_date: NaiveDateTime,
    paid_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteInvoiceRepository {
    pool: SqlitePool,
}

impl SqliteInvoiceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_invoice(row: InvoiceRow) -> Result<Invoice> {
        Ok(Invoice {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            invoice_number: row.invoice_number,
            project_id: Uuid::parse_str(&row.project_id).map_err(|e| AppError::Database(e.to_string()))?,
            client_id: Uuid::parse_str(&row.client_id).map_err(|e| AppError::Database(e.to_string()))?,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: parse_invoice_status(&row.status)?,
            due_date: DateTime::from_naive_utc_and_offset(row.due_date, Utc),
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_invoice_status(s: &str) -> Result<InvoiceStatus> {
    match s {
        "Draft" => Ok(InvoiceStatus::Draft),
        "Pending" => Ok(InvoiceStatus::Pending),
        "Paid" => Ok(InvoiceStatus::Paid),
        "Overdue" => Ok(InvoiceStatus::Overdue),
        "Cancelled" => Ok(InvoiceStatus::Cancelled),
        _ => Err(AppError::Database(format!("Invalid invoice status: {}", s))),
    }
}

fn invoice_status_to_str(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Draft => "Draft",
        InvoiceStatus::Pending => "Pending",
        InvoiceStatus::Paid => "Paid",
        InvoiceStatus::Overdue => "Overdue",
        InvoiceStatus::Cancelled => "Cancelled",
    }
}

/// Applies an invoice change on an open connection (usually a transaction).
pub(crate) async fn apply_change(
    conn: &mut SqliteConnection,
    invoice_id: Uuid,
    change: &InvoiceChange,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = ?,
            paid_at = COALESCE(?, paid_at),
            updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(invoice_status_to_str(change.status))
    .bind(change.paid_at.map(|dt| dt.naive_utc()))
    .bind(Utc::now().naive_utc())
    .bind(invoice_id.to_string())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Invoice {} not found", invoice_id)));
    }

    Ok(())
}

#[async_trait]
impl InvoiceRepository for SqliteInvoiceRepository {
    async fn create(&self, invoice: Invoice) -> Result<Invoice> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, project_id, client_id, amount_cents, currency,
                status, due_date, paid_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(invoice.id.to_string())
        .bind(&invoice.invoice_number)
        .bind(invoice.project_id.to_string())
        .bind(invoice.client_id.to_string())
        .bind(invoice.amount_cents)
        .bind(&invoice.currency)
        .bind(invoice_status_to_str(invoice.status))
        .bind(invoice.due_date.naive_utc())
        .bind(invoice.paid_at.map(|dt| dt.naive_utc()))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(invoice.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created invoice".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(
            r#"
            SELECT id, invoice_number, project_id, client_id, amount_cents, currency,
                   status, due_date, paid_at, created_at, updated_at
            FROM invoices
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_invoice).transpose()
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{EmailJob, EmailJobStatus, EmailKind, EmailPriority, NewEmailJob},
    error::{AppError, Result},
    repository::EmailJobRepository,
};

const EMAIL_JOB_COLUMNS: &str = r#"
    id, kind, priority, recipient_email, recipient_name, data, dedup_key,
    status, attempts, last_error, created_at, updated_at
"#;

#[derive(FromRow)]
struct EmailJobRow {
    id: String,
    kind: String,
    priority: String,
    recipient_email: String,
    recipient_name: Option<String>,
    data: String,
    dedup_key: String,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteEmailJobRepository {
    pool: SqlitePool,
}

impl SqliteEmailJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: EmailJobRow) -> Result<EmailJob> {
        Ok(EmailJob {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            kind: EmailKind::parse(&row.kind)
                .ok_or_else(|| AppError::Database(format!("Invalid email kind: {}", row.kind)))?,
            priority: Self::parse_priority(&row.priority)?,
            recipient_email: row.recipient_email,
            recipient_name: row.recipient_name,
            data: serde_json::from_str(&row.data)
                .map_err(|e| AppError::Database(format!("Invalid email data: {}", e)))?,
            dedup_key: row.dedup_key,
            status: Self::parse_status(&row.status)?,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_priority(s: &str) -> Result<EmailPriority> {
        match s {
            "High" => Ok(EmailPriority::High),
            "Normal" => Ok(EmailPriority::Normal),
            "Low" => Ok(EmailPriority::Low),
            _ => Err(AppError::Database(format!("Invalid email priority: {}", s))),
        }
    }

    fn priority_to_str(priority: EmailPriority) -> &'static str {
        match priority {
            EmailPriority::High => "High",
            EmailPriority::Normal => "Normal",
            EmailPriority::Low => "Low",
        }
    }

    fn parse_status(s: &str) -> Result<EmailJobStatus> {
        match s {
            "Pending" => Ok(EmailJobStatus::Pending),
            "Sent" => Ok(EmailJobStatus::Sent),
            "Failed" => Ok(EmailJobStatus::Failed),
            _ => Err(AppError::Database(format!("Invalid email job status: {}", s))),
        }
    }
}

#[async_trait]
impl EmailJobRepository for SqliteEmailJobRepository {
    async fn enqueue(&self, job: NewEmailJob) -> Result<bool> {
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO email_jobs (
                id, kind, priority, recipient_email, recipient_name, data, dedup_key,
                status, attempts, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 'Pending', 0, ?, ?)
            "#
        )
        .bind(Uuid::new_v4().to_string())
        .bind(job.kind.as_str())
        .bind(Self::priority_to_str(job.priority))
        .bind(&job.recipient_email)
        .bind(&job.recipient_name)
        .bind(job.data.to_string())
        .bind(&job.dedup_key)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<EmailJob>> {
        // High before Normal before Low, then oldest first.
        let sql = format!(
            r#"
            SELECT {}
            FROM email_jobs
            WHERE status = 'Pending'
            ORDER BY CASE priority WHEN 'High' THEN 0 WHEN 'Normal' THEN 1 ELSE 2 END,
                     created_at ASC
            LIMIT ?
            "#,
            EMAIL_JOB_COLUMNS
        );

        let rows = sqlx::query_as::<_, EmailJobRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_job)
            .collect()
    }

    async fn list_by_recipient(&self, recipient_email: &str) -> Result<Vec<EmailJob>> {
        let sql = format!(
            "SELECT {} FROM email_jobs WHERE recipient_email = ? ORDER BY created_at ASC",
            EMAIL_JOB_COLUMNS
        );

        let rows = sqlx::query_as::<_, EmailJobRow>(&sql)
            .bind(recipient_email)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_job)
            .collect()
    }

    async fn mark_sent(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = 'Sent', attempts = attempts + 1, last_error = NULL, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_failure(&self, id: Uuid, error: &str, give_up: bool) -> Result<()> {
        let status = if give_up { "Failed" } else { "Pending" };

        sqlx::query(
            r#"
            UPDATE email_jobs
            SET status = ?, attempts = attempts + 1, last_error = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(status)
        .bind(error)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

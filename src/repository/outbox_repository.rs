use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqliteConnection, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{NewOutboxEvent, OutboxEvent},
    error::{AppError, Result},
    repository::OutboxRepository,
};

const OUTBOX_COLUMNS: &str = r#"
    id, kind, payload, idempotency_key, attempts, last_error,
    created_at, next_attempt_at, processed_at, failed_at
"#;

#[derive(FromRow)]
struct OutboxRow {
    id: String,
    kind: String,
    payload: String,
    idempotency_key: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: NaiveDateTime,
    next_attempt_at: NaiveDateTime,
    processed_at: Option<NaiveDateTime>,
    failed_at: Option<NaiveDateTime>,
}

pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: OutboxRow) -> Result<OutboxEvent> {
        Ok(OutboxEvent {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            kind: row.kind,
            payload: serde_json::from_str(&row.payload)
                .map_err(|e| AppError::Database(format!("Invalid outbox payload: {}", e)))?,
            idempotency_key: row.idempotency_key,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            next_attempt_at: DateTime::from_naive_utc_and_offset(row.next_attempt_at, Utc),
            processed_at: row.processed_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            failed_at: row.failed_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
        })
    }
}

/// Inserts an event on an open connection, usually the transaction that
/// performs the state change the event describes. Returns false when an
/// event with the same idempotency key already exists.
pub(crate) async fn insert_event(conn: &mut SqliteConnection, event: &NewOutboxEvent) -> Result<bool> {
    let now = Utc::now().naive_utc();

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO outbox_events (
            id, kind, payload, idempotency_key, attempts, created_at, next_attempt_at
        ) VALUES (?, ?, ?, ?, 0, ?, ?)
        "#
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&event.kind)
    .bind(event.payload.to_string())
    .bind(&event.idempotency_key)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn enqueue(&self, event: NewOutboxEvent) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        insert_event(&mut conn, &event).await
    }

    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEvent>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM outbox_events
            WHERE processed_at IS NULL
              AND failed_at IS NULL
              AND next_attempt_at <= ?
            ORDER BY created_at ASC
            LIMIT ?
            "#,
            OUTBOX_COLUMNS
        );

        let rows = sqlx::query_as::<_, OutboxRow>(&sql)
            .bind(now.naive_utc())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(Self::row_to_event)
            .collect()
    }

    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<OutboxEvent>> {
        let sql = format!("SELECT {} FROM outbox_events WHERE idempotency_key = ?", OUTBOX_COLUMNS);
        let row = sqlx::query_as::<_, OutboxRow>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn mark_processed(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE outbox_events SET processed_at = ?, attempts = attempts + 1, last_error = NULL WHERE id = ?"
        )
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn schedule_retry(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET attempts = attempts + 1,
                last_error = ?,
                next_attempt_at = ?
            WHERE id = ?
            "#
        )
        .bind(error)
        .bind(next_attempt_at.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET attempts = attempts + 1,
                last_error = ?,
                failed_at = ?
            WHERE id = ?
            "#
        )
        .bind(error)
        .bind(Utc::now().naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

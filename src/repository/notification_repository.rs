use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{NewNotification, Notification},
    error::{AppError, Result},
    repository::NotificationRepository,
};

#[derive(FromRow)]
struct NotificationRow {
    id: String,
    user_id: String,
    title: String,
    message: String,
    notification_type: String,
    link: Option<String>,
    is_read: i32,
    dedup_key: Option<String>,
    created_at: NaiveDateTime,
}

pub struct SqliteNotificationRepository {
    pool: SqlitePool,
}

impl SqliteNotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_notification(row: NotificationRow) -> Result<Notification> {
        Ok(Notification {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            user_id: Uuid::parse_str(&row.user_id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            message: row.message,
            notification_type: row.notification_type,
            link: row.link,
            is_read: row.is_read != 0,
            dedup_key: row.dedup_key,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepository {
    async fn create_many(&self, notifications: Vec<NewNotification>) -> Result<u64> {
        if notifications.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT OR IGNORE INTO notifications \
             (id, user_id, title, message, notification_type, link, is_read, dedup_key, created_at) "
        );

        builder.push_values(notifications, |mut row, n| {
            row.push_bind(Uuid::new_v4().to_string())
                .push_bind(n.user_id.to_string())
                .push_bind(n.title)
                .push_bind(n.message)
                .push_bind(n.notification_type)
                .push_bind(n.link)
                .push_bind(0i32)
                .push_bind(n.dedup_key)
                .push_bind(now);
        });

        let result = builder.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }

    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, user_id, title, message, notification_type, link,
                   is_read, dedup_key, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#
        )
        .bind(user_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_notification)
            .collect()
    }

    async fn count_by_dedup_key(&self, dedup_key: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE dedup_key = ?"
        )
        .bind(dedup_key)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::Project,
    error::{AppError, Result},
    repository::ProjectRepository,
};

#[derive(FromRow)]
struct ProjectRow {
    id: String,
    title: String,
    client_id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_project(row: ProjectRow) -> Result<Project> {
        Ok(Project {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            title: row.title,
            client_id: Uuid::parse_str(&row.client_id).map_err(|e| AppError::Database(e.to_string()))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: Project) -> Result<Project> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO projects (id, title, client_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#
        )
        .bind(project.id.to_string())
        .bind(&project.title)
        .bind(project.client_id.to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(project.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created project".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            "SELECT id, title, client_id, created_at, updated_at FROM projects WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_project).transpose()
    }
}

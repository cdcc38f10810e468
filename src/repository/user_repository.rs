use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{CreateUserRequest, User, UserRole},
    error::{AppError, Result},
    repository::UserRepository,
};

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    full_name: String,
    role: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: UserRow) -> Result<User> {
        Ok(User {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            email: row.email,
            full_name: row.full_name,
            role: Self::parse_role(&row.role)?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    fn parse_role(s: &str) -> Result<UserRole> {
        match s {
            "Admin" => Ok(UserRole::Admin),
            "Client" => Ok(UserRole::Client),
            _ => Err(AppError::Database(format!("Invalid user role: {}", s))),
        }
    }

    fn role_to_str(role: UserRole) -> &'static str {
        match role {
            UserRole::Admin => "Admin",
            UserRole::Client => "Client",
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let id = Uuid::new_v4();
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO users (id, email, full_name, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(id.to_string())
        .bind(&request.email)
        .bind(&request.full_name)
        .bind(Self::role_to_str(request.role))
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created user".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, full_name, role, created_at, updated_at FROM users WHERE id = ?"
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_user).transpose()
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, full_name, role, created_at, updated_at
            FROM users
            WHERE role = ?
            ORDER BY created_at ASC
            "#
        )
        .bind(Self::role_to_str(role))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(Self::row_to_user)
            .collect()
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use agency::{
    config::Settings,
    domain::{
        CreateUserRequest, Invoice, InvoiceStatus, Payment, PaymentStatus, Project, User, UserRole,
    },
    email::RecordingMailer,
    payments::{FakeGateway, GatewayNotification, SignatureVerifier},
    service::ServiceContext,
};
use chrono::{Duration, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::path::PathBuf;
use uuid::Uuid;

pub const SERVER_KEY: &str = "SB-Mid-server-integration";
pub const BASE_URL: &str = "https://agency.test";

pub struct TestApp {
    pub pool: SqlitePool,
    pub settings: Settings,
    pub gateway: Arc<FakeGateway>,
    pub mailer: Arc<RecordingMailer>,
    pub ctx: Arc<ServiceContext>,
    db_file: Option<PathBuf>,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(path) = self.db_file.take() {
            for suffix in ["", "-wal", "-shm"] {
                let mut file = path.clone().into_os_string();
                file.push(suffix);
                let _ = std::fs::remove_file(file);
            }
        }
    }
}

pub struct Fixture {
    pub client: User,
    pub admins: Vec<User>,
    pub project: Project,
    pub invoice: Invoice,
    pub payment: Payment,
}

pub async fn setup() -> anyhow::Result<TestApp> {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    build(pool, None).await
}

/// Database in a temporary file, shared by `connections` pooled connections,
/// so transactions can genuinely overlap.
pub async fn setup_file_backed(connections: u32) -> anyhow::Result<TestApp> {
    let path = std::env::temp_dir().join(format!("agency-test-{}.db", Uuid::new_v4()));
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true)
        .busy_timeout(std::time::Duration::from_secs(10));

    let pool = SqlitePoolOptions::new()
        .max_connections(connections)
        .connect_with(options)
        .await?;

    build(pool, Some(path)).await
}

async fn build(pool: SqlitePool, db_file: Option<PathBuf>) -> anyhow::Result<TestApp> {
    sqlx::migrate!("./migrations").run(&pool).await?;

    let mut settings = Settings::default();
    settings.gateway.server_key = SERVER_KEY.to_string();
    settings.server.base_url = BASE_URL.to_string();
    settings.workers.max_attempts = 3;

    let gateway = Arc::new(FakeGateway::new());
    let mailer = Arc::new(RecordingMailer::new());

    let ctx = Arc::new(ServiceContext::new(
        pool.clone(),
        &settings,
        gateway.clone(),
        mailer.clone(),
    ));

    Ok(TestApp {
        pool,
        settings,
        gateway,
        mailer,
        ctx,
        db_file,
    })
}

impl TestApp {
    /// One client with a pending invoice and payment, plus `admin_count` admins.
    pub async fn seed(&self, order_id: &str, amount_cents: i64, admin_count: usize) -> anyhow::Result<Fixture> {
        let mut admins = Vec::new();
        for i in 0..admin_count {
            admins.push(self.ctx.user_repo.create(CreateUserRequest {
                email: format!("admin{}-{}@agency.test", i, order_id.to_lowercase()),
                full_name: format!("Admin {}", i),
                role: UserRole::Admin,
            }).await?);
        }

        let client = self.ctx.user_repo.create(CreateUserRequest {
            email: format!("client-{}@example.com", order_id.to_lowercase()),
            full_name: "Rina Wijaya".to_string(),
            role: UserRole::Client,
        }).await?;

        let project = self.ctx.project_repo.create(Project {
            id: Uuid::new_v4(),
            title: "Company Profile Website".to_string(),
            client_id: client.id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }).await?;

        let invoice = self.ctx.invoice_repo.create(Invoice {
            id: Uuid::new_v4(),
            invoice_number: format!("INV-{}", order_id),
            project_id: project.id,
            client_id: client.id,
            amount_cents,
            currency: "IDR".to_string(),
            status: InvoiceStatus::Pending,
            due_date: Utc::now() + Duration::days(14),
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }).await?;

        let payment = self.ctx.payment_repo.create(Payment {
            id: Uuid::new_v4(),
            invoice_id: invoice.id,
            order_id: order_id.to_string(),
            amount_cents,
            currency: "IDR".to_string(),
            status: PaymentStatus::Pending,
            payment_method: None,
            gateway_transaction_id: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }).await?;

        Ok(Fixture {
            client,
            admins,
            project,
            invoice,
            payment,
        })
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

/// A correctly signed notification for `order_id`.
pub fn signed_notification(order_id: &str, gross_amount: &str, transaction_status: &str) -> GatewayNotification {
    let status_code = "200";
    let signature_key = SignatureVerifier::new(SERVER_KEY).sign(order_id, status_code, gross_amount);

    GatewayNotification {
        order_id: order_id.to_string(),
        status_code: status_code.to_string(),
        gross_amount: gross_amount.to_string(),
        signature_key,
        transaction_status: Some(transaction_status.to_string()),
        payment_type: Some("bank_transfer".to_string()),
        transaction_id: Some(format!("txn-{}", order_id)),
    }
}

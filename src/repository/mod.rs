use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod user_repository;
pub mod project_repository;
pub mod invoice_repository;
pub mod payment_repository;
pub mod notification_repository;
pub mod outbox_repository;
pub mod email_job_repository;

pub use user_repository::SqliteUserRepository;
pub use project_repository::SqliteProjectRepository;
pub use invoice_repository::SqliteInvoiceRepository;
pub use payment_repository::SqlitePaymentRepository;
pub use notification_repository::SqliteNotificationRepository;
pub use outbox_repository::SqliteOutboxRepository;
pub use email_job_repository::SqliteEmailJobRepository;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: CreateUserRequest) -> Result<User>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: Project) -> Result<Project>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn create(&self, invoice: Invoice) -> Result<Invoice>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Invoice>>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Payment>>;
    /// Writes a gateway update to the payment and, in the same transaction,
    /// the derived invoice change and outbox event when present.
    ///
    /// The write only applies while the stored status still equals
    /// `payment.status`. Returns `None` and writes nothing when another
    /// update got there first.
    async fn apply_gateway_update(
        &self,
        payment: &Payment,
        update: PaymentUpdate,
        invoice_change: Option<InvoiceChange>,
        event: Option<NewOutboxEvent>,
    ) -> Result<Option<Payment>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Inserts all notifications in one statement, returns how many rows
    /// were actually written (deduplicated rows are skipped).
    async fn create_many(&self, notifications: Vec<NewNotification>) -> Result<u64>;
    async fn list_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Notification>>;
    async fn count_by_dedup_key(&self, dedup_key: &str) -> Result<i64>;
}

#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(&self, event: NewOutboxEvent) -> Result<bool>;
    async fn fetch_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<OutboxEvent>>;
    async fn find_by_idempotency_key(&self, key: &str) -> Result<Option<OutboxEvent>>;
    async fn mark_processed(&self, id: Uuid) -> Result<()>;
    async fn schedule_retry(&self, id: Uuid, error: &str, next_attempt_at: DateTime<Utc>) -> Result<()>;
    async fn mark_failed(&self, id: Uuid, error: &str) -> Result<()>;
}

#[async_trait]
pub trait EmailJobRepository: Send + Sync {
    /// Queues a job; returns false when a job with the same dedup key exists.
    async fn enqueue(&self, job: NewEmailJob) -> Result<bool>;
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<EmailJob>>;
    async fn list_by_recipient(&self, recipient_email: &str) -> Result<Vec<EmailJob>>;
    async fn mark_sent(&self, id: Uuid) -> Result<()>;
    async fn record_failure(&self, id: Uuid, error: &str, give_up: bool) -> Result<()>;
}

use std::sync::Arc;
use sqlx::SqlitePool;
use tokio::sync::Notify;

use crate::config::Settings;
use crate::email::{EmailDeliveryWorker, Mailer};
use crate::events::{EventHandler, NotificationDispatcher, OutboxWorker};
use crate::payments::{PaymentGateway, PaymentReconciler, SignatureVerifier};
use crate::repository::*;

/// Wires repositories, the reconciliation flow and the background workers.
pub struct ServiceContext {
    pub user_repo: Arc<dyn UserRepository>,
    pub project_repo: Arc<dyn ProjectRepository>,
    pub invoice_repo: Arc<dyn InvoiceRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub outbox_repo: Arc<dyn OutboxRepository>,
    pub email_repo: Arc<dyn EmailJobRepository>,
    pub reconciler: Arc<PaymentReconciler>,
    pub outbox_worker: Arc<OutboxWorker>,
    pub email_worker: Arc<EmailDeliveryWorker>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        settings: &Settings,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let user_repo: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(db_pool.clone()));
        let project_repo: Arc<dyn ProjectRepository> = Arc::new(SqliteProjectRepository::new(db_pool.clone()));
        let invoice_repo: Arc<dyn InvoiceRepository> = Arc::new(SqliteInvoiceRepository::new(db_pool.clone()));
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let notification_repo: Arc<dyn NotificationRepository> =
            Arc::new(SqliteNotificationRepository::new(db_pool.clone()));
        let outbox_repo: Arc<dyn OutboxRepository> = Arc::new(SqliteOutboxRepository::new(db_pool.clone()));
        let email_repo: Arc<dyn EmailJobRepository> = Arc::new(SqliteEmailJobRepository::new(db_pool.clone()));

        let outbox_signal = Arc::new(Notify::new());

        let reconciler = Arc::new(PaymentReconciler::new(
            SignatureVerifier::new(settings.gateway.server_key.clone()),
            gateway,
            payment_repo.clone(),
            outbox_signal.clone(),
        ));

        let dispatcher: Arc<dyn EventHandler> = Arc::new(NotificationDispatcher::new(
            payment_repo.clone(),
            invoice_repo.clone(),
            project_repo.clone(),
            user_repo.clone(),
            notification_repo.clone(),
            email_repo.clone(),
            settings.server.base_url.clone(),
        ));

        let outbox_worker = Arc::new(OutboxWorker::new(
            outbox_repo.clone(),
            vec![dispatcher],
            outbox_signal,
            settings.workers.clone(),
        ));

        let email_worker = Arc::new(EmailDeliveryWorker::new(
            email_repo.clone(),
            mailer,
            settings.workers.clone(),
        ));

        Self {
            user_repo,
            project_repo,
            invoice_repo,
            payment_repo,
            notification_repo,
            outbox_repo,
            email_repo,
            reconciler,
            outbox_worker,
            email_worker,
            db_pool,
        }
    }
}

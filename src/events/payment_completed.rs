use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    domain::{
        format_amount, EmailKind, EmailPriority, Invoice, NewEmailJob, NewNotification,
        OutboxEvent, Payment, PaymentCompleted, PaymentConfirmationData, Project, User, UserRole,
        PAYMENT_COMPLETED,
    },
    error::{AppError, Result},
    events::EventHandler,
    repository::{
        EmailJobRepository, InvoiceRepository, NotificationRepository, PaymentRepository,
        ProjectRepository, UserRepository,
    },
};

pub const NOTIFICATION_TITLE: &str = "Payment received";
pub const NOTIFICATION_TYPE: &str = "payment";

/// Fans a completed payment out to the client (receipt email) and to every
/// administrator (in-app notification).
pub struct NotificationDispatcher {
    payment_repo: Arc<dyn PaymentRepository>,
    invoice_repo: Arc<dyn InvoiceRepository>,
    project_repo: Arc<dyn ProjectRepository>,
    user_repo: Arc<dyn UserRepository>,
    notification_repo: Arc<dyn NotificationRepository>,
    email_repo: Arc<dyn EmailJobRepository>,
    base_url: String,
}

struct PaymentContext {
    payment: Payment,
    invoice: Invoice,
    project: Project,
    client: User,
    paid: PaymentCompleted,
}

impl NotificationDispatcher {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        invoice_repo: Arc<dyn InvoiceRepository>,
        project_repo: Arc<dyn ProjectRepository>,
        user_repo: Arc<dyn UserRepository>,
        notification_repo: Arc<dyn NotificationRepository>,
        email_repo: Arc<dyn EmailJobRepository>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            payment_repo,
            invoice_repo,
            project_repo,
            user_repo,
            notification_repo,
            email_repo,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn load(&self, paid: PaymentCompleted) -> Result<PaymentContext> {
        let payment = self.payment_repo.find_by_id(paid.payment_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", paid.payment_id)))?;
        let invoice = self.invoice_repo.find_by_id(payment.invoice_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Invoice {} not found", payment.invoice_id)))?;
        let project = self.project_repo.find_by_id(invoice.project_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Project {} not found", invoice.project_id)))?;
        let client = self.user_repo.find_by_id(invoice.client_id).await?
            .ok_or_else(|| AppError::NotFound(format!("Client {} not found", invoice.client_id)))?;

        Ok(PaymentContext {
            payment,
            invoice,
            project,
            client,
            paid,
        })
    }

    async fn queue_receipt(&self, ctx: &PaymentContext) -> Result<()> {
        let data = PaymentConfirmationData {
            client_name: ctx.client.full_name.clone(),
            invoice_number: ctx.invoice.invoice_number.clone(),
            amount: format_amount(ctx.payment.amount_cents, &ctx.payment.currency),
            currency: ctx.payment.currency.clone(),
            project_title: ctx.project.title.clone(),
            payment_method: ctx
                .payment
                .payment_method
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            paid_date: ctx.paid.paid_at.format("%d %B %Y").to_string(),
            dashboard_url: format!("{}/dashboard/invoices", self.base_url),
        };

        let queued = self
            .email_repo
            .enqueue(NewEmailJob {
                kind: EmailKind::PaymentConfirmation,
                priority: EmailPriority::High,
                recipient_email: ctx.client.email.clone(),
                recipient_name: Some(ctx.client.full_name.clone()),
                data: serde_json::to_value(data)?,
                dedup_key: format!("payment-confirmation:{}", ctx.payment.id),
            })
            .await?;

        if queued {
            tracing::info!(payment_id = %ctx.payment.id, to = %ctx.client.email, "Queued payment confirmation email");
        } else {
            tracing::debug!(payment_id = %ctx.payment.id, "Payment confirmation email already queued");
        }

        Ok(())
    }

    async fn notify_admins(&self, ctx: &PaymentContext) -> Result<()> {
        let admins = self.user_repo.list_by_role(UserRole::Admin).await?;
        let message = admin_message(ctx);
        let link = self.invoice_link(&ctx.invoice.invoice_number)?;
        let dedup_key = format!("payment-completed:{}", ctx.payment.id);

        let notifications: Vec<NewNotification> = admins
            .iter()
            .map(|admin| NewNotification {
                user_id: admin.id,
                title: NOTIFICATION_TITLE.to_string(),
                message: message.clone(),
                notification_type: NOTIFICATION_TYPE.to_string(),
                link: Some(link.clone()),
                dedup_key: Some(dedup_key.clone()),
            })
            .collect();

        let created = self.notification_repo.create_many(notifications).await?;

        tracing::info!(
            payment_id = %ctx.payment.id,
            admins = admins.len(),
            created,
            "Notified administrators of payment"
        );

        Ok(())
    }

    fn invoice_link(&self, invoice_number: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([("search", invoice_number)])
            .map_err(|e| AppError::Internal(format!("Failed to encode link: {}", e)))?;
        Ok(format!("{}/admin/invoices?{}", self.base_url, query))
    }
}

fn admin_message(ctx: &PaymentContext) -> String {
    format!(
        "{} paid invoice {} for {} ({})",
        ctx.client.full_name,
        ctx.invoice.invoice_number,
        ctx.project.title,
        format_amount(ctx.payment.amount_cents, &ctx.payment.currency),
    )
}

#[async_trait]
impl EventHandler for NotificationDispatcher {
    fn name(&self) -> &str {
        "payment-notifications"
    }

    fn handles(&self, kind: &str) -> bool {
        kind == PAYMENT_COMPLETED
    }

    async fn handle(&self, event: &OutboxEvent) -> Result<()> {
        let paid: PaymentCompleted = serde_json::from_value(event.payload.clone())?;
        let ctx = self.load(paid).await?;

        // Both fan-outs are attempted even if the first fails.
        let receipt = self.queue_receipt(&ctx).await;
        let admins = self.notify_admins(&ctx).await;

        if let Err(ref e) = receipt {
            tracing::error!(payment_id = %ctx.payment.id, "Failed to queue payment email: {}", e);
        }
        if let Err(ref e) = admins {
            tracing::error!(payment_id = %ctx.payment.id, "Failed to notify administrators: {}", e);
        }

        receipt.and(admins)
    }
}

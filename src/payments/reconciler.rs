use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    domain::{
        GatewayStatus, InvoiceChange, NewOutboxEvent, Payment, PaymentCompleted, PaymentStatus,
        PaymentUpdate, Transition, PAYMENT_COMPLETED,
    },
    error::{AppError, Result},
    payments::{PaymentGateway, SignatureVerifier},
    repository::PaymentRepository,
};

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Body of an inbound gateway notification.
///
/// Signed fields default to empty so that a missing field fails validation
/// instead of deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct GatewayNotification {
    #[serde(default)]
    #[validate(length(min = 1, message = "order_id is required"))]
    pub order_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "status_code is required"))]
    pub status_code: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "gross_amount is required"))]
    pub gross_amount: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "signature_key is required"))]
    pub signature_key: String,
    pub transaction_status: Option<String>,
    pub payment_type: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    Updated {
        payment: Payment,
        previous: PaymentStatus,
        gateway_status: GatewayStatus,
    },
    /// The payment already settled in the reported state; nothing was written.
    AlreadyProcessed {
        payment: Payment,
        gateway_status: GatewayStatus,
    },
    /// The reported state cannot follow the recorded one; nothing was written.
    Ignored {
        payment: Payment,
        gateway_status: GatewayStatus,
    },
}

impl ReconcileOutcome {
    pub fn gateway_status(&self) -> &GatewayStatus {
        match self {
            ReconcileOutcome::Updated { gateway_status, .. }
            | ReconcileOutcome::AlreadyProcessed { gateway_status, .. }
            | ReconcileOutcome::Ignored { gateway_status, .. } => gateway_status,
        }
    }

    pub fn payment(&self) -> &Payment {
        match self {
            ReconcileOutcome::Updated { payment, .. }
            | ReconcileOutcome::AlreadyProcessed { payment, .. }
            | ReconcileOutcome::Ignored { payment, .. } => payment,
        }
    }
}

/// Runs the webhook flow: verify, resolve, persist, emit.
pub struct PaymentReconciler {
    verifier: SignatureVerifier,
    gateway: Arc<dyn PaymentGateway>,
    payment_repo: Arc<dyn PaymentRepository>,
    outbox_signal: Arc<Notify>,
}

impl PaymentReconciler {
    pub fn new(
        verifier: SignatureVerifier,
        gateway: Arc<dyn PaymentGateway>,
        payment_repo: Arc<dyn PaymentRepository>,
        outbox_signal: Arc<Notify>,
    ) -> Self {
        Self {
            verifier,
            gateway,
            payment_repo,
            outbox_signal,
        }
    }

    pub async fn handle_notification(
        &self,
        notification: GatewayNotification,
    ) -> Result<ReconcileOutcome> {
        notification.validate()?;

        if !self.verifier.verify(
            &notification.order_id,
            &notification.status_code,
            &notification.gross_amount,
            &notification.signature_key,
        ) {
            tracing::warn!(order_id = %notification.order_id, "Rejected notification with invalid signature");
            return Err(AppError::BadRequest("Invalid signature".to_string()));
        }

        let state = self
            .gateway
            .transaction_status(&notification.order_id)
            .await?;

        let payment = self
            .payment_repo
            .find_by_order_id(&notification.order_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(order_id = %notification.order_id, "Notification for unknown payment");
                AppError::NotFound("Payment not found".to_string())
            })?;

        let gateway_status = GatewayStatus::parse(&state.transaction_status);
        if let Some(reported) = notification.transaction_status.as_deref() {
            if reported != gateway_status.as_str() {
                tracing::debug!(
                    order_id = %payment.order_id,
                    reported,
                    resolved = %gateway_status.as_str(),
                    "Notification status differs from gateway status"
                );
            }
        }
        let target = gateway_status.payment_status();
        let resolved_at = Utc::now();
        let payment_method = state.payment_type.or_else(|| notification.payment_type.clone());
        let transaction_id = state
            .transaction_id
            .or_else(|| notification.transaction_id.clone());

        let mut payment = payment;
        let mut attempts = 0;

        loop {
            match payment.status.transition_to(target) {
                Transition::Apply => {}
                Transition::Redelivered => {
                    tracing::info!(
                        order_id = %payment.order_id,
                        payment_id = %payment.id,
                        status = ?payment.status,
                        "Payment already settled, skipping redelivered notification"
                    );
                    return Ok(ReconcileOutcome::AlreadyProcessed { payment, gateway_status });
                }
                Transition::Stale => {
                    tracing::warn!(
                        order_id = %payment.order_id,
                        payment_id = %payment.id,
                        current = ?payment.status,
                        reported = %gateway_status.as_str(),
                        "Ignoring gateway status that cannot follow the recorded one"
                    );
                    return Ok(ReconcileOutcome::Ignored { payment, gateway_status });
                }
            }

            let update = PaymentUpdate {
                status: target,
                payment_method: payment_method.clone(),
                gateway_transaction_id: transaction_id.clone(),
                paid_at: (target == PaymentStatus::Completed).then_some(resolved_at),
            };
            let invoice_change = InvoiceChange::for_payment(target, resolved_at);
            let event = completion_event(&payment, target, transaction_id.as_deref(), resolved_at)?;
            let emits_event = event.is_some();
            let previous = payment.status;

            let Some(updated) = self
                .payment_repo
                .apply_gateway_update(&payment, update, invoice_change, event)
                .await?
            else {
                // Another delivery changed the row since it was read.
                attempts += 1;
                if attempts >= MAX_WRITE_ATTEMPTS {
                    return Err(AppError::Internal(format!(
                        "Payment {} kept changing during reconciliation",
                        payment.order_id
                    )));
                }
                tracing::debug!(
                    order_id = %payment.order_id,
                    payment_id = %payment.id,
                    "Payment changed concurrently, re-evaluating"
                );
                payment = self
                    .payment_repo
                    .find_by_id(payment.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
                continue;
            };

            tracing::info!(
                order_id = %updated.order_id,
                payment_id = %updated.id,
                from = ?previous,
                to = ?updated.status,
                gateway_status = %gateway_status.as_str(),
                "Payment reconciled"
            );

            if emits_event {
                self.outbox_signal.notify_one();
            }

            return Ok(ReconcileOutcome::Updated {
                payment: updated,
                previous,
                gateway_status,
            });
        }
    }
}

fn completion_event(
    payment: &Payment,
    target: PaymentStatus,
    transaction_id: Option<&str>,
    paid_at: DateTime<Utc>,
) -> Result<Option<NewOutboxEvent>> {
    if target != PaymentStatus::Completed {
        return Ok(None);
    }

    let key = format!(
        "{}:{}",
        PAYMENT_COMPLETED,
        transaction_id.unwrap_or(&payment.order_id)
    );
    let completed = PaymentCompleted {
        payment_id: payment.id,
        invoice_id: payment.invoice_id,
        order_id: payment.order_id.clone(),
        paid_at,
    };
    Ok(Some(completed.into_event(key)?))
}

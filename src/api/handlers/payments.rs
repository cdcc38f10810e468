use axum::{
    body::Bytes,
    extract::State,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    api::state::AppState,
    error::{AppError, Result},
    payments::{GatewayNotification, ReconcileOutcome},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    pub message: String,
    /// Transaction status as reported by the gateway.
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Gateway payment notification.
#[utoipa::path(
    post,
    path = "/api/payments/webhook",
    request_body = GatewayNotification,
    responses(
        (status = 200, description = "Notification processed", body = WebhookResponse),
        (status = 400, description = "Missing fields or invalid signature", body = ErrorResponse),
        (status = 404, description = "No payment for this order id", body = ErrorResponse),
        (status = 500, description = "Gateway or database failure", body = ErrorResponse)
    ),
    tag = "payments"
)]
pub async fn gateway_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WebhookResponse>> {
    let notification: GatewayNotification = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))?;

    let outcome = state
        .service_context
        .reconciler
        .handle_notification(notification)
        .await?;

    let message = match &outcome {
        ReconcileOutcome::Updated { .. } => "Payment status updated",
        ReconcileOutcome::AlreadyProcessed { .. } => "Payment already processed",
        ReconcileOutcome::Ignored { .. } => "Stale status ignored",
    };

    Ok(Json(WebhookResponse {
        message: message.to_string(),
        status: outcome.gateway_status().as_str().to_string(),
    }))
}

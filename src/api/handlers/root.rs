use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Agency API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Payment reconciliation for the agency dashboard",
        "endpoints": {
            "health": "/health",
            "webhook": "/api/payments/webhook",
            "docs": "/api/docs"
        }
    }))
}

/// Reports `healthy` only while the database answers.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = chrono::Utc::now().to_rfc3339();

    match sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await
    {
        Ok(_) => (StatusCode::OK, Json(json!({
            "status": "healthy",
            "timestamp": timestamp
        }))),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({
                "status": "unhealthy",
                "timestamp": timestamp
            })))
        }
    }
}

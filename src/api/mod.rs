pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use std::sync::Arc;

use crate::service::ServiceContext;
use state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::payments::gateway_webhook),
    components(schemas(
        crate::payments::GatewayNotification,
        handlers::payments::WebhookResponse,
        handlers::payments::ErrorResponse,
    )),
    tags((name = "payments", description = "Payment gateway callbacks"))
)]
pub struct ApiDoc;

pub fn create_app(service_context: Arc<ServiceContext>) -> Router {
    let app_state = AppState::new(service_context);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // API routes
        .nest("/api/payments", payment_routes())

        .merge(SwaggerUi::new("/api/docs").url("/api/openapi.json", ApiDoc::openapi()))

        // Add state to the router
        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        // Called by the gateway; authenticity comes from the signature, not a session.
        .route("/webhook", post(handlers::payments::gateway_webhook))
}

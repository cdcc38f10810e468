use std::sync::Arc;
use sqlx::sqlite::SqlitePoolOptions;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agency::{
    api,
    config::Settings,
    email::{LogMailer, Mailer, SmtpMailer},
    payments::HttpGatewayClient,
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agency=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        e
    })?;

    if settings.gateway.server_key.is_empty() {
        tracing::warn!("Gateway server key not configured; every webhook will be rejected");
    }

    tracing::info!("Starting Agency server on {}:{}", settings.server.host, settings.server.port);

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let gateway = Arc::new(HttpGatewayClient::new(&settings.gateway)?);

    let mailer: Arc<dyn Mailer> = if settings.email.enabled {
        tracing::info!("SMTP email delivery enabled");
        Arc::new(SmtpMailer::new(&settings.email)?)
    } else {
        tracing::info!("SMTP email delivery disabled");
        Arc::new(LogMailer)
    };

    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        &settings,
        gateway,
        mailer,
    ));

    // Background workers
    let shutdown = CancellationToken::new();
    let outbox_task = tokio::spawn(
        service_context.outbox_worker.clone().run(shutdown.clone()),
    );
    let email_task = tokio::spawn(
        service_context.email_worker.clone().run(shutdown.clone()),
    );

    let app = api::create_app(service_context);

    let listener = tokio::net::TcpListener::bind(
        format!("{}:{}", settings.server.host, settings.server.port)
    ).await?;

    tracing::info!("Server listening on http://{}:{}", settings.server.host, settings.server.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    let _ = tokio::join!(outbox_task, email_task);
    db_pool.close().await;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown requested");
        }
        _ = shutdown.cancelled() => {}
    }
}

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::domain::OutboxEvent;
use crate::error::Result;
use crate::repository::OutboxRepository;

pub mod payment_completed;

pub use payment_completed::NotificationDispatcher;

const BASE_BACKOFF_SECS: u64 = 5;
const MAX_BACKOFF_SECS: u64 = 3600;

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;
    fn handles(&self, kind: &str) -> bool;
    async fn handle(&self, event: &OutboxEvent) -> Result<()>;
}

/// Delivers outbox events to every handler registered for their kind.
///
/// An event is marked processed once all its handlers succeed. Any failure
/// reschedules the whole event, so handlers must tolerate redelivery.
pub struct OutboxWorker {
    repo: Arc<dyn OutboxRepository>,
    handlers: Vec<Arc<dyn EventHandler>>,
    signal: Arc<Notify>,
    config: WorkerConfig,
}

impl OutboxWorker {
    pub fn new(
        repo: Arc<dyn OutboxRepository>,
        handlers: Vec<Arc<dyn EventHandler>>,
        signal: Arc<Notify>,
        config: WorkerConfig,
    ) -> Self {
        for handler in &handlers {
            tracing::info!("Registered outbox handler: {}", handler.name());
        }

        Self {
            repo,
            handlers,
            signal,
            config,
        }
    }

    /// Processes one batch of due events, returns how many were completed.
    pub async fn run_once(&self) -> Result<usize> {
        let events = self.repo.fetch_due(Utc::now(), self.config.batch_size).await?;
        let mut processed = 0;

        for event in events {
            match self.deliver(&event).await {
                Ok(()) => {
                    self.repo.mark_processed(event.id).await?;
                    processed += 1;
                }
                Err(error) => {
                    let attempt = event.attempts + 1;
                    if attempt >= self.config.max_attempts {
                        tracing::error!(
                            event_id = %event.id,
                            kind = %event.kind,
                            attempt,
                            error = %error,
                            "Outbox event failed permanently"
                        );
                        self.repo.mark_failed(event.id, &error).await?;
                    } else {
                        let next = Utc::now() + backoff(attempt);
                        tracing::warn!(
                            event_id = %event.id,
                            kind = %event.kind,
                            attempt,
                            error = %error,
                            "Outbox event failed, retrying at {}",
                            next
                        );
                        self.repo.schedule_retry(event.id, &error, next).await?;
                    }
                }
            }
        }

        Ok(processed)
    }

    async fn deliver(&self, event: &OutboxEvent) -> std::result::Result<(), String> {
        let mut errors = Vec::new();
        let mut handled = false;

        for handler in self.handlers.iter().filter(|h| h.handles(&event.kind)) {
            handled = true;
            match handler.handle(event).await {
                Ok(()) => {
                    tracing::debug!(
                        event_id = %event.id,
                        "Handler {} processed event",
                        handler.name()
                    );
                }
                Err(e) => {
                    // Keep going so one failing handler does not starve the others.
                    errors.push(format!("{}: {}", handler.name(), e));
                }
            }
        }

        if !handled {
            tracing::debug!(event_id = %event.id, kind = %event.kind, "No handler for outbox event");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        tracing::info!("Outbox worker started");

        loop {
            if let Err(e) = self.run_once().await {
                tracing::error!("Outbox pass failed: {:?}", e);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.signal.notified() => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Outbox worker stopped");
    }
}

/// Exponential backoff with up to one second of jitter.
fn backoff(attempt: i32) -> chrono::Duration {
    let exp = attempt.clamp(0, 20) as u32;
    let secs = BASE_BACKOFF_SECS.saturating_mul(2u64.saturating_pow(exp)).min(MAX_BACKOFF_SECS);
    let jitter_ms = rand::thread_rng().gen_range(0..1000);
    chrono::Duration::seconds(secs as i64) + chrono::Duration::milliseconds(jitter_ms)
}

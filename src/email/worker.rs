use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    config::WorkerConfig,
    domain::EmailJob,
    email::{templates, Mailer},
    error::Result,
    repository::EmailJobRepository,
};

/// Drains the email queue through a [`Mailer`].
pub struct EmailDeliveryWorker {
    repo: Arc<dyn EmailJobRepository>,
    mailer: Arc<dyn Mailer>,
    config: WorkerConfig,
}

impl EmailDeliveryWorker {
    pub fn new(
        repo: Arc<dyn EmailJobRepository>,
        mailer: Arc<dyn Mailer>,
        config: WorkerConfig,
    ) -> Self {
        Self { repo, mailer, config }
    }

    /// Sends one batch of pending jobs, returns how many were sent.
    pub async fn run_once(&self) -> Result<usize> {
        let jobs = self.repo.fetch_pending(self.config.batch_size).await?;
        let mut sent = 0;

        for job in jobs {
            match self.deliver(&job).await {
                Ok(()) => {
                    self.repo.mark_sent(job.id).await?;
                    sent += 1;
                    tracing::info!(job_id = %job.id, kind = job.kind.as_str(), "Email sent");
                }
                Err(e) => {
                    let give_up = job.attempts + 1 >= self.config.max_attempts;
                    self.repo.record_failure(job.id, &e.to_string(), give_up).await?;
                    if give_up {
                        tracing::error!(job_id = %job.id, error = %e, "Email delivery failed permanently");
                    } else {
                        tracing::warn!(job_id = %job.id, attempt = job.attempts + 1, error = %e, "Email delivery failed");
                    }
                }
            }
        }

        Ok(sent)
    }

    async fn deliver(&self, job: &EmailJob) -> Result<()> {
        let email = templates::render(
            job.kind,
            &job.data,
            &job.recipient_email,
            job.recipient_name.as_deref(),
        )?;
        self.mailer.send(&email).await
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let interval = Duration::from_millis(self.config.poll_interval_ms);
        tracing::info!("Email delivery worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if let Err(e) = self.run_once().await {
                tracing::error!("Email delivery pass failed: {:?}", e);
            }
        }

        tracing::info!("Email delivery worker stopped");
    }
}

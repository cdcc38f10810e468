use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
};

pub mod templates;
pub mod worker;

pub use worker::EmailDeliveryWorker;

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to_email: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| AppError::Email("SMTP host not configured".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Email(format!("SMTP relay error: {}", e)))?
            .port(config.smtp_port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = mailbox(Some(&config.from_name), &config.from_address)?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox> {
    let address = address
        .parse()
        .map_err(|e| AppError::Email(format!("Invalid address {}: {}", address, e)))?;
    Ok(Mailbox::new(name.map(str::to_string), address))
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mailbox(email.to_name.as_deref(), &email.to_email)?)
            .subject(&email.subject)
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|e| AppError::Email(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::Email(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}

/// Mailer used when SMTP is disabled: logs instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to_email,
            subject = %email.subject,
            "Email delivery disabled, not sending"
        );
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Keeps every sent email in memory; can be switched to fail.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(AppError::Email("SMTP unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }
}

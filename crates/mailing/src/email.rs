use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("email delivery failed: {0}")]
pub struct EmailError(pub String);

/// Outbound email delivery.
#[async_trait]
pub trait Emailer: Send + Sync {
    async fn send(&self, email_address: &str, title: &str, content: &str) -> Result<(), EmailError>;
}

/// Emailer that only logs what it would have sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEmailer;

impl LoggingEmailer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Emailer for LoggingEmailer {
    async fn send(&self, email_address: &str, title: &str, content: &str) -> Result<(), EmailError> {
        info!(
            to = email_address,
            title,
            content,
            "logging emailer: sending email"
        );
        Ok(())
    }
}

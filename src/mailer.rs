use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::MailConfig;

/// Seam for outbound email. Handlers only depend on this trait; the concrete
/// transport is chosen at startup.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()>;
}

/// Development mailer: records outbound messages in the log instead of
/// talking to an SMTP relay.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from: config.from.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        info!(%to, %subject, from = %self.from, "outbound email");
        debug!(body = %html_body, "outbound email body");
        Ok(())
    }
}

//! services/api/src/adapters/mailer.rs
//!
//! No SMTP relay is wired in; outgoing mail is written to the log.

use async_trait::async_trait;
use tracing::info;
use tutoring_core::ports::{Mailer, PortResult};

#[derive(Clone, Copy, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> PortResult<()> {
        info!(recipient, template, data = %data, "Outgoing mail");
        Ok(())
    }
}

//! Relaying fetched messages to other recipients

use crate::{CoreResult, MailSource};
use async_trait::async_trait;
use graphrelay_smtp::SmtpRelay;
use tracing::{info, warn};

/// Something that can deliver raw message bytes to a list of recipients
#[async_trait]
pub trait MessageRelay: Send + Sync {
    async fn send_raw(&self, raw: &[u8], recipients: &[String]) -> CoreResult<()>;
}

#[async_trait]
impl MessageRelay for SmtpRelay {
    async fn send_raw(&self, raw: &[u8], recipients: &[String]) -> CoreResult<()> {
        Ok(self.forward_raw(raw, recipients).await?)
    }
}

/// Outcome of the relay step for one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardStatus {
    /// Forwarding is turned off
    Disabled,
    /// Delivered to this many recipients
    Sent { recipients: usize },
    /// Fetching or sending failed
    Failed(String),
}

/// Relay configured with its fixed recipient list
pub struct Forwarder {
    relay: Box<dyn MessageRelay>,
    recipients: Vec<String>,
}

impl Forwarder {
    pub fn new(relay: Box<dyn MessageRelay>, recipients: Vec<String>) -> Self {
        Self { relay, recipients }
    }

    /// Fetch the raw message and send it unmodified to `recipients`
    pub async fn forward<S: MailSource + ?Sized>(
        &self,
        source: &S,
        message_id: &str,
        recipients: &[String],
    ) -> CoreResult<()> {
        let raw = source.fetch_mime(message_id).await?;
        self.relay.send_raw(&raw, recipients).await?;
        info!("Forwarded {} ({} bytes)", message_id, raw.len());
        Ok(())
    }

    /// Forward to the configured recipients, folding any error into the status
    pub async fn forward_to_all<S: MailSource + ?Sized>(
        &self,
        source: &S,
        message_id: &str,
    ) -> ForwardStatus {
        match self.forward(source, message_id, &self.recipients).await {
            Ok(()) => ForwardStatus::Sent {
                recipients: self.recipients.len(),
            },
            Err(e) => {
                warn!("Forwarding {} failed: {}", message_id, e);
                ForwardStatus::Failed(e.to_string())
            }
        }
    }
}

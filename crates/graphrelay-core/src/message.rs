//! Message and attachment summaries shown to the operator

use chrono::{DateTime, Utc};
use graphrelay_graph::{GraphAttachment, GraphMessageEnvelope};
use tracing::warn;

/// Envelope data for a newly arrived message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSummary {
    /// Provider message id
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Vec<String>,
    pub received_at: DateTime<Utc>,
    pub has_attachments: bool,
    pub preview: Option<String>,
}

impl MessageSummary {
    /// Convert a Graph envelope; `None` when `receivedDateTime` is missing or malformed
    pub fn from_graph(envelope: GraphMessageEnvelope) -> Option<Self> {
        let received_at = match envelope
            .received_date_time
            .as_deref()
            .map(DateTime::parse_from_rfc3339)
        {
            Some(Ok(ts)) => ts.with_timezone(&Utc),
            Some(Err(e)) => {
                warn!("Skipping message {}: bad receivedDateTime: {}", envelope.id, e);
                return None;
            }
            None => {
                warn!("Skipping message {}: no receivedDateTime", envelope.id);
                return None;
            }
        };

        Some(Self {
            from: envelope.from_address().map(str::to_string),
            to: envelope.to_addresses(),
            id: envelope.id,
            subject: envelope.subject,
            received_at,
            has_attachments: envelope.has_attachments,
            preview: envelope.body_preview,
        })
    }
}

/// Attachment metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentInfo {
    pub name: String,
}

impl From<GraphAttachment> for AttachmentInfo {
    fn from(att: GraphAttachment) -> Self {
        Self {
            name: att.name.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

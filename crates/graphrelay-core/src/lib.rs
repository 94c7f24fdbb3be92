//! Core logic for graphrelay
//!
//! Provides the watermark, the mailbox poller, the relay step and the
//! polling loop that ties them together.

mod error;
mod message;
mod monitor;
mod poller;
mod relay;
mod source;
mod watermark;

pub use error::{CoreError, CoreResult};
pub use message::{AttachmentInfo, MessageSummary};
pub use monitor::{
    render_message, AttachmentListing, IterationOutcome, IterationReport, Monitor,
    MonitorSettings, ProcessedMessage, RunStats,
};
pub use poller::MailboxPoller;
pub use relay::{ForwardStatus, Forwarder, MessageRelay};
pub use source::{GraphMailSource, MailSource};
pub use watermark::{select_new, Watermark, WatermarkFile};

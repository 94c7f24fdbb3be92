//! Polling loop
//!
//! Each iteration authenticates, polls for new messages, relays them and
//! prints a block per message. Failures end the iteration, never the loop.

use crate::{
    AttachmentInfo, CoreError, CoreResult, ForwardStatus, Forwarder, MailSource, MailboxPoller,
    MessageSummary,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const RULE_WIDTH: usize = 80;

/// Loop settings
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Folder to watch (well-known name or folder id)
    pub folder: String,
    /// Maximum messages fetched per poll
    pub limit: u32,
    /// Keep polling after the first iteration
    pub continuous: bool,
    /// Pause between iterations
    pub loop_delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            folder: "inbox".to_string(),
            limit: 50,
            continuous: true,
            loop_delay: Duration::from_secs(5),
        }
    }
}

/// What could be learned about a message's attachments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentListing {
    /// The message has none
    None,
    /// Metadata was fetched
    Listed(Vec<AttachmentInfo>),
    /// The message has some, but listing them failed
    Unavailable,
}

/// A message handled during an iteration
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub summary: MessageSummary,
    pub attachments: AttachmentListing,
    pub forward: ForwardStatus,
}

/// Result of one successful iteration
#[derive(Debug, Clone, Default)]
pub struct IterationReport {
    pub messages: Vec<ProcessedMessage>,
}

impl IterationReport {
    pub fn forwarded(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.forward, ForwardStatus::Sent { .. }))
            .count()
    }

    pub fn forward_failures(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.forward, ForwardStatus::Failed(_)))
            .count()
    }
}

/// Per-iteration result consumed by [`Monitor::run`]
#[derive(Debug)]
pub enum IterationOutcome {
    Completed(IterationReport),
    Failed(CoreError),
}

/// Totals across the whole run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub checks: u64,
    pub failed_checks: u64,
    pub new_messages: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
}

/// Drives poller and relay for one mailbox
pub struct Monitor<S> {
    source: S,
    poller: MailboxPoller,
    forwarder: Option<Forwarder>,
    settings: MonitorSettings,
    stats: RunStats,
}

impl<S: MailSource> Monitor<S> {
    pub fn new(source: S, poller: MailboxPoller, settings: MonitorSettings) -> Self {
        Self {
            source,
            poller,
            forwarder: None,
            settings,
            stats: RunStats::default(),
        }
    }

    /// Enable relaying of every new message
    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn poller(&self) -> &MailboxPoller {
        &self.poller
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run a single poll, relaying and printing every new message
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        self.stats.checks += 1;

        match self.poll_and_process().await {
            Ok(report) => {
                self.stats.new_messages += report.messages.len() as u64;
                self.stats.forwarded += report.forwarded() as u64;
                self.stats.forward_failures += report.forward_failures() as u64;
                IterationOutcome::Completed(report)
            }
            Err(e) => {
                self.stats.failed_checks += 1;
                IterationOutcome::Failed(e)
            }
        }
    }

    async fn poll_and_process(&mut self) -> CoreResult<IterationReport> {
        self.source.ensure_authenticated().await?;

        let messages = self
            .poller
            .get_new_messages(&self.source, &self.settings.folder, self.settings.limit)
            .await?;

        let mut report = IterationReport::default();
        for summary in messages {
            let processed = self.process(summary).await;
            print!("{}", render_message(&processed));
            report.messages.push(processed);
        }

        Ok(report)
    }

    async fn process(&self, summary: MessageSummary) -> ProcessedMessage {
        let attachments = if summary.has_attachments {
            match self.source.list_attachments(&summary.id).await {
                Ok(list) => AttachmentListing::Listed(list),
                Err(e) => {
                    warn!("Could not list attachments of {}: {}", summary.id, e);
                    AttachmentListing::Unavailable
                }
            }
        } else {
            AttachmentListing::None
        };

        let forward = match &self.forwarder {
            Some(forwarder) => forwarder.forward_to_all(&self.source, &summary.id).await,
            None => ForwardStatus::Disabled,
        };

        ProcessedMessage {
            summary,
            attachments,
            forward,
        }
    }

    /// Poll until `shutdown` flips to true, or once when not continuous.
    ///
    /// Shutdown is only observed between iterations, so an in-flight API
    /// call or SMTP session always completes.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RunStats {
        info!(
            "Monitoring folder '{}' (continuous={}, delay={}s)",
            self.settings.folder,
            self.settings.continuous,
            self.settings.loop_delay.as_secs()
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.run_iteration().await {
                IterationOutcome::Completed(report) => debug!(
                    "Iteration {} done: {} new, {} forwarded",
                    self.stats.checks,
                    report.messages.len(),
                    report.forwarded()
                ),
                IterationOutcome::Failed(e) => {
                    error!("Iteration {} failed: {}", self.stats.checks, e)
                }
            }

            if !self.settings.continuous || *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.settings.loop_delay) => {}
                changed = shutdown.changed() => {
                    // Sender gone: nobody can request a stop any more, keep the pace
                    if changed.is_err() {
                        tokio::time::sleep(self.settings.loop_delay).await;
                    }
                }
            }
        }

        info!("Monitor stopped after {} checks", self.stats.checks);
        self.stats.clone()
    }
}

/// Console block for one processed message
pub fn render_message(message: &ProcessedMessage) -> String {
    let summary = &message.summary;
    let mut out = String::new();

    out.push('\n');
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "From: {}\n",
        summary.from.as_deref().unwrap_or("Unknown")
    ));
    out.push_str(&format!(
        "   To: {}\n",
        summary.to.first().map(String::as_str).unwrap_or("Unknown")
    ));
    out.push_str(&format!(
        "   Subject: {}\n",
        summary.subject.as_deref().unwrap_or("[No Subject]")
    ));

    match &message.attachments {
        AttachmentListing::None => {}
        AttachmentListing::Listed(list) => {
            let names: Vec<&str> = list.iter().map(|a| a.name.as_str()).collect();
            out.push_str(&format!(
                "   Attachments ({}): {}\n",
                list.len(),
                names.join(", ")
            ));
        }
        AttachmentListing::Unavailable => out.push_str("   Has attachments: Yes\n"),
    }

    match &message.forward {
        ForwardStatus::Disabled => {}
        ForwardStatus::Sent { recipients } => {
            out.push_str(&format!("   Forward: sent to {} recipient(s)\n", recipients))
        }
        ForwardStatus::Failed(reason) => out.push_str(&format!("   Forward: FAILED ({})\n", reason)),
    }

    out
}

//! Mailbox poller

use crate::{select_new, CoreResult, MailSource, MessageSummary, Watermark, WatermarkFile};
use tracing::{debug, info, warn};

/// Reports each message of a folder once, oldest first
pub struct MailboxPoller {
    watermark: Option<Watermark>,
    store: Option<WatermarkFile>,
}

impl MailboxPoller {
    /// Poller that keeps its watermark in memory only
    pub fn new() -> Self {
        Self {
            watermark: None,
            store: None,
        }
    }

    /// Poller that resumes from, and saves to, a tracking file
    pub fn with_store(store: WatermarkFile) -> Self {
        let watermark = store.load();
        match &watermark {
            Some(w) => info!(
                "Resuming after message received {} ({})",
                w.filter_value(),
                store.path().display()
            ),
            None => info!("No tracking state in {}, first run", store.path().display()),
        }
        Self {
            watermark,
            store: Some(store),
        }
    }

    /// Start from an explicit watermark
    pub fn starting_at(mut self, watermark: Option<Watermark>) -> Self {
        self.watermark = watermark;
        self
    }

    pub fn watermark(&self) -> Option<&Watermark> {
        self.watermark.as_ref()
    }

    /// Messages in `folder` that arrived since the last call, oldest first.
    ///
    /// At most `limit` are returned; a larger backlog drains over the
    /// following calls. An empty mailbox is not an error; the watermark is
    /// left alone.
    pub async fn get_new_messages<S: MailSource + ?Sized>(
        &mut self,
        source: &S,
        folder: &str,
        limit: u32,
    ) -> CoreResult<Vec<MessageSummary>> {
        let batch = source
            .list_messages(folder, limit, self.watermark.as_ref())
            .await?;

        let (fresh, next) = select_new(self.watermark.as_ref(), batch, limit as usize);
        if fresh.is_empty() {
            debug!("No new messages in {}", folder);
            return Ok(fresh);
        }

        self.watermark = next;
        if let (Some(store), Some(newest)) = (&self.store, fresh.last()) {
            if let Err(e) = store.save(newest) {
                warn!("Could not save tracking file: {}", e);
            }
        }

        info!("Found {} new message(s) in {}", fresh.len(), folder);
        Ok(fresh)
    }
}

impl Default for MailboxPoller {
    fn default() -> Self {
        Self::new()
    }
}

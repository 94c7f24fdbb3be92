//! Mailbox access
//!
//! [`MailSource`] is what the poller and relay need from the mail provider.
//! [`GraphMailSource`] implements it over Microsoft Graph and owns the
//! application token.

use crate::{AttachmentInfo, CoreResult, MessageSummary, Watermark};
use async_trait::async_trait;
use graphrelay_auth::Authenticator;
use graphrelay_graph::{GraphError, GraphMailClient, GraphResult};
use std::future::Future;
use tracing::{debug, info, warn};

/// Read access to one mailbox
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Make sure a valid credential is available before the first API call
    async fn ensure_authenticated(&self) -> CoreResult<()> {
        Ok(())
    }

    /// Messages of `folder` received after `after`, newest first.
    ///
    /// With a watermark every matching message is returned, however many
    /// there are. Without one only the newest `limit` are.
    async fn list_messages(
        &self,
        folder: &str,
        limit: u32,
        after: Option<&Watermark>,
    ) -> CoreResult<Vec<MessageSummary>>;

    /// Raw RFC 822 bytes of a message
    async fn fetch_mime(&self, message_id: &str) -> CoreResult<Vec<u8>>;

    /// Attachment metadata of a message
    async fn list_attachments(&self, message_id: &str) -> CoreResult<Vec<AttachmentInfo>>;
}

/// Graph-backed mailbox with transparent token refresh
pub struct GraphMailSource {
    auth: Authenticator,
    graph: GraphMailClient,
}

impl GraphMailSource {
    pub fn new(auth: Authenticator, graph: GraphMailClient) -> Self {
        Self { auth, graph }
    }

    /// Run `call` with a current token. A 401 drops the token and retries once
    /// with a freshly acquired one.
    async fn authorized<T, F, Fut>(&self, call: F) -> CoreResult<T>
    where
        F: Fn(String) -> Fut + Send + Sync,
        Fut: Future<Output = GraphResult<T>> + Send,
        T: Send,
    {
        let token = self.auth.access_token().await?;
        match call(token).await {
            Err(GraphError::Unauthorized(msg)) => {
                warn!("Graph rejected the access token ({}), reacquiring", msg);
                self.auth.invalidate().await;
                let token = self.auth.access_token().await?;
                Ok(call(token).await?)
            }
            other => Ok(other?),
        }
    }
}

#[async_trait]
impl MailSource for GraphMailSource {
    async fn ensure_authenticated(&self) -> CoreResult<()> {
        self.auth.access_token().await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        folder: &str,
        limit: u32,
        after: Option<&Watermark>,
    ) -> CoreResult<Vec<MessageSummary>> {
        let since = after.map(Watermark::filter_value);
        let since = since.as_deref();

        let (mut envelopes, mut next_link) = self
            .authorized(|token| async move {
                self.graph.list_messages(&token, folder, limit, since).await
            })
            .await?;

        if after.is_some() {
            // The filter bounds the result set, so paging ends at the watermark
            while let Some(link) = next_link.take() {
                let link = link.as_str();
                let (page, next) = self
                    .authorized(|token| async move {
                        self.graph.list_messages_next(&token, link).await
                    })
                    .await?;
                envelopes.extend(page);
                next_link = next;
            }
        } else if next_link.is_some() {
            info!(
                "First poll of {}: older messages beyond the newest {} are not reported",
                folder, limit
            );
        }

        let messages: Vec<_> = envelopes
            .into_iter()
            .filter_map(MessageSummary::from_graph)
            .collect();
        debug!("Listed {} messages in {}", messages.len(), folder);
        Ok(messages)
    }

    async fn fetch_mime(&self, message_id: &str) -> CoreResult<Vec<u8>> {
        self.authorized(|token| async move { self.graph.fetch_mime(&token, message_id).await })
            .await
    }

    async fn list_attachments(&self, message_id: &str) -> CoreResult<Vec<AttachmentInfo>> {
        let attachments = self
            .authorized(|token| async move {
                self.graph.list_attachments(&token, message_id).await
            })
            .await?;
        Ok(attachments.into_iter().map(AttachmentInfo::from).collect())
    }
}

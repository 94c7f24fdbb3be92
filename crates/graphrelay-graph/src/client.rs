use crate::error::{GraphError, GraphResult};
use crate::types::*;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Message fields to select in list queries (keeps payload small)
const MESSAGE_SELECT: &str =
    "id,subject,from,toRecipients,receivedDateTime,hasAttachments,bodyPreview";

/// Attachment fields to select (never contentBytes)
const ATTACHMENT_SELECT: &str = "name";

/// Mailbox client for a single user's mailbox using application permissions
pub struct GraphMailClient {
    client: reqwest::Client,
    base_url: Url,
    mailbox: String,
}

impl GraphMailClient {
    pub fn new(mailbox: impl Into<String>, timeout: Duration) -> GraphResult<Self> {
        Self::with_base_url(GRAPH_BASE, mailbox, timeout)
    }

    /// Client against a non-default Graph endpoint (national clouds, tests)
    pub fn with_base_url(
        base_url: &str,
        mailbox: impl Into<String>,
        timeout: Duration,
    ) -> GraphResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GraphError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GraphError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            mailbox: mailbox.into(),
        })
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// List messages in a folder, newest first.
    ///
    /// With `received_after` set, only messages received strictly after that
    /// RFC 3339 timestamp are returned. The second element is the next page
    /// link, present when more messages match than `top`.
    pub async fn list_messages(
        &self,
        access_token: &str,
        folder: &str,
        top: u32,
        received_after: Option<&str>,
    ) -> GraphResult<(Vec<GraphMessageEnvelope>, Option<String>)> {
        let mut url = self.user_url(&["mailFolders", folder, "messages"]);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("$select", MESSAGE_SELECT)
                .append_pair("$orderby", "receivedDateTime desc")
                .append_pair("$top", &top.to_string());
            if let Some(since) = received_after {
                query.append_pair("$filter", &format!("receivedDateTime gt {}", since));
            }
        }
        debug!(
            "Graph: listing messages folder={} top={} since={:?}",
            folder, top, received_after
        );

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let list: GraphListResponse<GraphMessageEnvelope> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        let next_link = list.next_link;
        debug!(
            "Graph: got {} messages, has_more={}",
            list.value.len(),
            next_link.is_some()
        );
        Ok((list.value, next_link))
    }

    /// Follow an `@odata.nextLink` returned by [`list_messages`](Self::list_messages)
    pub async fn list_messages_next(
        &self,
        access_token: &str,
        next_link: &str,
    ) -> GraphResult<(Vec<GraphMessageEnvelope>, Option<String>)> {
        let url = Url::parse(next_link)
            .map_err(|e| GraphError::InvalidUrl(format!("{}: {}", next_link, e)))?;
        debug!("Graph: fetching next page");

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let list: GraphListResponse<GraphMessageEnvelope> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        let next_link = list.next_link;
        Ok((list.value, next_link))
    }

    /// Fetch the raw MIME (RFC 822) content of a message, byte for byte
    pub async fn fetch_mime(&self, access_token: &str, message_id: &str) -> GraphResult<Vec<u8>> {
        let url = self.user_url(&["messages", message_id, "$value"]);
        debug!("Graph: fetching MIME for {}", message_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.bytes().await?;
        debug!("Graph: got MIME {} bytes", body.len());
        Ok(body.to_vec())
    }

    /// List attachment metadata for a message
    pub async fn list_attachments(
        &self,
        access_token: &str,
        message_id: &str,
    ) -> GraphResult<Vec<GraphAttachment>> {
        let mut url = self.user_url(&["messages", message_id, "attachments"]);
        url.query_pairs_mut().append_pair("$select", ATTACHMENT_SELECT);
        debug!("Graph: listing attachments for {}", message_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await?;
        let response = check_status(response).await?;

        let list: GraphListResponse<GraphAttachment> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        info!(
            "Graph: found {} attachments for {}",
            list.value.len(),
            message_id
        );
        Ok(list.value)
    }

    /// `{base}/users/{mailbox}/{segments...}` with every segment percent-encoded
    fn user_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("users")
                .push(&self.mailbox)
                .extend(segments);
        }
        url
    }
}

/// Turn a non-2xx response into the matching `GraphError`
async fn check_status(response: reqwest::Response) -> GraphResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorResponse>(&body)
        .map(|e| match e.error.message {
            Some(msg) => format!("{}: {}", e.error.code, msg),
            None => e.error.code,
        })
        .unwrap_or_else(|_| body.clone());

    Err(match status.as_u16() {
        401 => GraphError::Unauthorized(message),
        403 => GraphError::Forbidden(message),
        status => GraphError::ApiError { status, body },
    })
}

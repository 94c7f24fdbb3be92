use serde::Deserialize;

/// Response wrapper for Graph API list endpoints
#[derive(Debug, Deserialize)]
pub struct GraphListResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A message envelope from Graph API (lightweight, no body)
#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessageEnvelope {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<GraphEmailWrapper>,
    #[serde(rename = "toRecipients", default)]
    pub to_recipients: Vec<GraphEmailWrapper>,
    #[serde(rename = "receivedDateTime")]
    pub received_date_time: Option<String>,
    #[serde(rename = "hasAttachments", default)]
    pub has_attachments: bool,
    #[serde(rename = "bodyPreview")]
    pub body_preview: Option<String>,
}

impl GraphMessageEnvelope {
    /// Sender address, if the message carries one
    pub fn from_address(&self) -> Option<&str> {
        self.from.as_ref().and_then(|f| f.email_address.address.as_deref())
    }

    /// All To addresses, skipping entries without an address
    pub fn to_addresses(&self) -> Vec<String> {
        self.to_recipients
            .iter()
            .filter_map(|r| r.email_address.address.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailWrapper {
    #[serde(rename = "emailAddress")]
    pub email_address: GraphEmailAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Attachment metadata (content bytes are never requested)
#[derive(Debug, Clone, Deserialize)]
pub struct GraphAttachment {
    pub name: Option<String>,
}

/// Error envelope returned by Graph on non-2xx responses
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorDetail {
    pub code: String,
    pub message: Option<String>,
}

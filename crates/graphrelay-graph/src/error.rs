use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Graph API rejected the access token: {0}")]
    Unauthorized(String),

    #[error("Graph API denied access: {0}")]
    Forbidden(String),

    #[error("Graph API error {status}: {body}")]
    ApiError { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid Graph URL: {0}")]
    InvalidUrl(String),
}

impl GraphError {
    /// Whether the failure happened in transport (connect, timeout, body read)
    pub fn is_network(&self) -> bool {
        matches!(self, GraphError::RequestFailed(_))
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

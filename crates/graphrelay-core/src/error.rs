//! Error types for the core module

use graphrelay_auth::AuthError;
use graphrelay_graph::GraphError;
use graphrelay_smtp::SmtpError;
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad credentials, or the API rejected the token
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Endpoint unreachable or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// API answered forbidden / insufficient scope
    #[error("Permission denied: {0}")]
    Permission(String),

    /// SMTP relay failure
    #[error("Relay error: {0}")]
    Relay(String),

    /// Any other non-success API response
    #[error("Mail API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Unexpected response payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AuthError> for CoreError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NetworkError(msg) => CoreError::Network(msg),
            AuthError::InvalidConfig(msg) => CoreError::Config(msg),
            other => CoreError::Auth(other.to_string()),
        }
    }
}

impl From<GraphError> for CoreError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::RequestFailed(err) => CoreError::Network(err.to_string()),
            GraphError::Unauthorized(msg) => CoreError::Auth(msg),
            GraphError::Forbidden(msg) => CoreError::Permission(msg),
            GraphError::ApiError { status, body } => CoreError::Api { status, body },
            GraphError::ParseError(msg) => CoreError::Parse(msg),
            GraphError::InvalidUrl(msg) => CoreError::Config(msg),
        }
    }
}

impl From<SmtpError> for CoreError {
    fn from(e: SmtpError) -> Self {
        CoreError::Relay(e.to_string())
    }
}

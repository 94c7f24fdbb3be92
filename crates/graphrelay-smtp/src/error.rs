//! Error types for SMTP operations

use thiserror::Error;

/// Result type for SMTP operations
pub type SmtpResult<T> = Result<T, SmtpError>;

/// Errors that can occur during SMTP operations
#[derive(Debug, Error)]
pub enum SmtpError {
    /// Connection failed
    #[error("Failed to connect to SMTP server: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("SMTP authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server refused the envelope sender or a recipient
    #[error("SMTP server rejected the envelope: {0}")]
    RecipientRejected(String),

    /// Failed to send message
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Invalid email address
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// TLS error
    #[error("TLS error: {0}")]
    TlsError(String),
}

impl From<lettre::transport::smtp::Error> for SmtpError {
    fn from(e: lettre::transport::smtp::Error) -> Self {
        let detail = e.to_string();
        match e.status().map(|code| code.to_string()) {
            Some(code) => match code.as_str() {
                "530" | "534" | "535" | "454" => SmtpError::AuthenticationFailed(detail),
                "550" | "551" | "553" | "554" => SmtpError::RecipientRejected(detail),
                _ => SmtpError::SendFailed(detail),
            },
            None if e.is_client() => SmtpError::SendFailed(detail),
            None => SmtpError::ConnectionFailed(detail),
        }
    }
}

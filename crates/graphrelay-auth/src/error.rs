//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// Token endpoint rejected the client credentials
    #[error("Invalid client credentials: {0}")]
    InvalidCredentials(String),

    /// Token exchange failed for a reason other than rejected credentials
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether the failure came from the transport rather than the token endpoint
    pub fn is_network(&self) -> bool {
        matches!(self, AuthError::NetworkError(_))
    }
}

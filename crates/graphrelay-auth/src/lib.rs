//! Authentication module for graphrelay
//!
//! Acquires application-only access tokens for Microsoft Graph through the
//! OAuth2 client-credentials grant. No user interaction is involved; the
//! registered application authenticates with its own secret.

mod error;
mod oauth2;

pub use error::{AuthError, AuthResult};
pub use oauth2::{AccessToken, Authenticator, OAuth2Config};

/// Microsoft identity platform defaults
pub mod graph {
    /// Scope requesting every application permission granted to the app
    pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

    /// Public cloud authority host
    pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
}

/// Static application credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application (client) ID
    pub client_id: String,
    /// Directory (tenant) ID
    pub tenant_id: String,
    /// Client secret
    pub client_secret: String,
    /// Mailbox the application reads
    pub mailbox: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("tenant_id", &self.tenant_id)
            .field("client_secret", &"<redacted>")
            .field("mailbox", &self.mailbox)
            .finish()
    }
}

impl Credentials {
    /// Token endpoint configuration for these credentials
    pub fn oauth2_config(&self, authority: &str) -> OAuth2Config {
        OAuth2Config::for_tenant(authority, &self.tenant_id)
    }
}

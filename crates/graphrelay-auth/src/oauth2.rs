//! OAuth2 client-credentials flow
//!
//! Acquires application-only access tokens for the Graph API (RFC 6749
//! section 4.4) and caches them until they are about to expire.

use crate::{AuthError, AuthResult, Credentials};
use oauth2::{
    basic::BasicClient, AuthType, AuthUrl, ClientId, ClientSecret, RequestTokenError, Scope,
    TokenResponse, TokenUrl,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Seconds before `expires_at` at which a token is already treated as expired
const EXPIRY_SKEW_SECS: i64 = 60;

/// Client-credentials endpoint configuration
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// Authorization endpoint URL (required by the client, unused by this grant)
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
    /// Upper bound for a single token request
    pub timeout: Duration,
}

impl OAuth2Config {
    /// Endpoints of a Microsoft identity platform tenant
    pub fn for_tenant(authority: &str, tenant_id: &str) -> Self {
        let authority = authority.trim_end_matches('/');
        Self {
            auth_url: format!("{}/{}/oauth2/v2.0/authorize", authority, tenant_id),
            token_url: format!("{}/{}/oauth2/v2.0/token", authority, tenant_id),
            scopes: vec![crate::graph::DEFAULT_SCOPE.to_string()],
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An application access token
#[derive(Clone)]
pub struct AccessToken {
    /// Bearer token for API calls
    pub access_token: String,
    /// Token expiration timestamp (Unix seconds)
    pub expires_at: Option<i64>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl AccessToken {
    /// Check if the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    /// Same as [`is_expired`](Self::is_expired) against an explicit clock
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - now < EXPIRY_SKEW_SECS,
            None => false,
        }
    }
}

/// Owns the application token and reacquires it when it expires
pub struct Authenticator {
    client: BasicClient,
    scopes: Vec<String>,
    timeout: Duration,
    cached: Mutex<Option<AccessToken>>,
}

impl Authenticator {
    /// Create an authenticator for the given credentials and endpoints
    pub fn new(credentials: &Credentials, config: OAuth2Config) -> AuthResult<Self> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))?;

        // Entra ID expects the secret as a form field, not HTTP basic auth
        let client = BasicClient::new(
            ClientId::new(credentials.client_id.clone()),
            Some(ClientSecret::new(credentials.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody);

        Ok(Self {
            client,
            scopes: config.scopes,
            timeout: config.timeout,
            cached: Mutex::new(None),
        })
    }

    /// Return a valid bearer token, acquiring a new one if the cached token expired
    pub async fn access_token(&self) -> AuthResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
            debug!("Cached access token expired, reacquiring");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Drop the cached token so the next call reacquires one
    pub async fn invalidate(&self) {
        let mut cached = self.cached.lock().await;
        if cached.take().is_some() {
            debug!("Access token invalidated");
        }
    }

    async fn request_token(&self) -> AuthResult<AccessToken> {
        let mut request = self.client.exchange_client_credentials();
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let response = tokio::time::timeout(
            self.timeout,
            request.request_async(oauth2::reqwest::async_http_client),
        )
        .await
        .map_err(|_| {
            AuthError::NetworkError(format!(
                "token request timed out after {}s",
                self.timeout.as_secs()
            ))
        })?;

        let token_response = response.map_err(|e| match e {
            RequestTokenError::ServerResponse(body) => {
                let description = body
                    .error_description()
                    .cloned()
                    .unwrap_or_else(|| body.to_string());
                warn!("Token endpoint rejected credentials: {}", description);
                AuthError::InvalidCredentials(description)
            }
            RequestTokenError::Request(err) => AuthError::NetworkError(err.to_string()),
            RequestTokenError::Parse(err, _) => AuthError::TokenExchangeFailed(format!(
                "Malformed token response: {}",
                err
            )),
            RequestTokenError::Other(msg) => AuthError::TokenExchangeFailed(msg),
        })?;

        let expires_at = token_response
            .expires_in()
            .map(|duration| chrono::Utc::now().timestamp() + duration.as_secs() as i64);

        info!(
            "Obtained access token (expires in {}s)",
            token_response
                .expires_in()
                .map(|d| d.as_secs().to_string())
                .unwrap_or_else(|| "?".to_string())
        );

        Ok(AccessToken {
            access_token: token_response.access_token().secret().clone(),
            expires_at,
        })
    }
}

//! SMTP relay implementation

use crate::{SmtpError, SmtpResult};
use lettre::{
    address::Envelope, transport::smtp::authentication::Credentials, Address, AsyncSmtpTransport,
    AsyncTransport, Tokio1Executor,
};
use std::time::Duration;
use tracing::{debug, info};

/// How the SMTP session is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// Plain connection upgraded with STARTTLS
    StartTls,
    /// TLS from the first byte (SMTPS, usually port 465)
    Tls,
    /// No encryption
    None,
}

impl SmtpSecurity {
    /// Map a "use TLS" switch to a mode; port 465 implies implicit TLS
    pub fn from_flag(use_tls: bool, port: u16) -> Self {
        match (use_tls, port) {
            (false, _) => SmtpSecurity::None,
            (true, 465) => SmtpSecurity::Tls,
            (true, _) => SmtpSecurity::StartTls,
        }
    }
}

/// Outgoing SMTP server settings
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Login user; authentication is skipped when empty
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    /// Envelope sender (`MAIL FROM`)
    pub from: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("security", &self.security)
            .field("from", &self.from)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Relays raw messages through one SMTP server.
///
/// A fresh session is opened for every message and closed afterwards.
pub struct SmtpRelay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Address,
    host: String,
    port: u16,
}

impl SmtpRelay {
    /// Create a relay from server settings
    pub fn new(config: &SmtpConfig) -> SmtpResult<Self> {
        let from = parse_address(&config.from)?;

        let mut builder = match config.security {
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| SmtpError::TlsError(e.to_string()))?
            }
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| SmtpError::TlsError(e.to_string()))?,
            SmtpSecurity::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            }
        }
        .port(config.port)
        .timeout(Some(config.timeout));

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            host: config.host.clone(),
            port: config.port,
        })
    }

    /// Send `raw` exactly as given to every address in `recipients`
    pub async fn forward_raw(&self, raw: &[u8], recipients: &[String]) -> SmtpResult<()> {
        let to = recipients
            .iter()
            .map(|r| parse_address(r))
            .collect::<SmtpResult<Vec<_>>>()?;

        let envelope = Envelope::new(Some(self.from.clone()), to)
            .map_err(|e| SmtpError::InvalidAddress(e.to_string()))?;

        debug!(
            "Relaying {} bytes via {}:{} to {} recipient(s)",
            raw.len(),
            self.host,
            self.port,
            recipients.len()
        );

        self.transport.send_raw(&envelope, raw).await?;

        info!("Message relayed to {}", recipients.join(", "));
        Ok(())
    }
}

/// Check that every address in `addresses` is a valid mailbox
pub fn validate_addresses(addresses: &[String]) -> SmtpResult<()> {
    addresses.iter().try_for_each(|a| parse_address(a).map(drop))
}

fn parse_address(address: &str) -> SmtpResult<Address> {
    address
        .trim()
        .parse()
        .map_err(|e| SmtpError::InvalidAddress(format!("{}: {}", address, e)))
}

//! Command-line and environment configuration

use anyhow::{bail, Context, Result};
use clap::builder::{BoolishValueParser, NonEmptyStringValueParser};
use clap::{ArgAction, Parser};
use graphrelay_auth::Credentials;
use graphrelay_core::MonitorSettings;
use graphrelay_smtp::{SmtpConfig, SmtpSecurity};
use std::path::PathBuf;
use std::time::Duration;

/// Watch a Microsoft 365 mailbox and relay new messages over SMTP
#[derive(Debug, Parser)]
#[command(name = "graphrelay", version, about)]
pub struct Cli {
    /// Application (client) ID of the app registration
    #[arg(long, env = "CLIENT_ID", value_parser = NonEmptyStringValueParser::new())]
    pub client_id: String,

    /// Directory (tenant) ID
    #[arg(long, env = "TENANT_ID", value_parser = NonEmptyStringValueParser::new())]
    pub tenant_id: String,

    /// Client secret of the app registration
    #[arg(long, env = "CLIENT_SECRET", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub client_secret: String,

    /// Mailbox to watch
    #[arg(long = "mailbox", env = "MAILBOX_EMAIL", value_parser = NonEmptyStringValueParser::new())]
    pub mailbox_email: String,

    /// Mail folder to watch
    #[arg(long, env = "MAIL_FOLDER", default_value = "inbox")]
    pub folder: String,

    /// Maximum messages fetched per check
    #[arg(long, env = "POLL_LIMIT", default_value_t = 50, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub limit: u32,

    /// Seconds between checks
    #[arg(long, env = "LOOP_DELAY_SECONDS", default_value_t = 5)]
    pub loop_delay_seconds: u64,

    /// Keep checking instead of running once
    #[arg(long = "continuous", env = "ENABLE_CONTINUOUS_LOOP", default_value_t = true,
          action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub continuous: bool,

    /// File that keeps the last seen message between runs
    #[arg(long, env = "WATERMARK_FILE")]
    pub watermark_file: Option<PathBuf>,

    /// Relay every new message over SMTP
    #[arg(long = "smtp-forward", env = "ENABLE_SMTP_FORWARD", default_value_t = false,
          action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub smtp_forward: bool,

    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "SMTP_PORT", default_value_t = 587)]
    pub smtp_port: u16,

    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Secure the SMTP session (STARTTLS, or implicit TLS on port 465)
    #[arg(long = "smtp-use-tls", env = "SMTP_USE_TLS", default_value_t = true,
          action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub smtp_use_tls: bool,

    /// Envelope sender for relayed messages
    #[arg(long, env = "SMTP_FROM")]
    pub smtp_from: Option<String>,

    /// Comma-separated relay recipients
    #[arg(long, env = "SMTP_TO")]
    pub smtp_to: Option<String>,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub http_timeout_seconds: u64,

    #[arg(long, env = "SMTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub smtp_timeout_seconds: u64,

    /// Identity platform authority
    #[arg(long, env = "GRAPH_AUTHORITY", default_value = graphrelay_auth::graph::DEFAULT_AUTHORITY)]
    pub graph_authority: String,

    /// Graph API root
    #[arg(long, env = "GRAPH_API_BASE", default_value = graphrelay_graph::client::GRAPH_BASE)]
    pub graph_api_base: String,
}

/// SMTP relay settings, present only when forwarding is enabled
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    pub smtp: SmtpConfig,
    pub recipients: Vec<String>,
}

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub monitor: MonitorSettings,
    pub watermark_file: Option<PathBuf>,
    pub forward: Option<ForwardConfig>,
    pub http_timeout: Duration,
    pub graph_authority: String,
    pub graph_api_base: String,
}

impl Cli {
    /// Check cross-field rules and build the runtime configuration
    pub fn into_config(self) -> Result<Config> {
        if self.http_timeout_seconds == 0 {
            bail!("HTTP_TIMEOUT_SECONDS must be greater than zero");
        }

        let forward = if self.smtp_forward {
            Some(self.forward_config()?)
        } else {
            None
        };

        Ok(Config {
            credentials: Credentials {
                client_id: self.client_id,
                tenant_id: self.tenant_id,
                client_secret: self.client_secret,
                mailbox: self.mailbox_email,
            },
            monitor: MonitorSettings {
                folder: self.folder,
                limit: self.limit,
                continuous: self.continuous,
                loop_delay: Duration::from_secs(self.loop_delay_seconds),
            },
            watermark_file: self.watermark_file,
            forward,
            http_timeout: Duration::from_secs(self.http_timeout_seconds),
            graph_authority: self.graph_authority,
            graph_api_base: self.graph_api_base,
        })
    }

    fn forward_config(&self) -> Result<ForwardConfig> {
        let host = non_empty(&self.smtp_host)
            .context("ENABLE_SMTP_FORWARD is set but SMTP_HOST is empty")?;
        let from = non_empty(&self.smtp_from)
            .context("ENABLE_SMTP_FORWARD is set but SMTP_FROM is empty")?;
        let recipients = parse_recipients(self.smtp_to.as_deref().unwrap_or(""));
        if recipients.is_empty() {
            bail!("ENABLE_SMTP_FORWARD is set but SMTP_TO lists no recipients");
        }
        if self.smtp_timeout_seconds == 0 {
            bail!("SMTP_TIMEOUT_SECONDS must be greater than zero");
        }

        Ok(ForwardConfig {
            smtp: SmtpConfig {
                host,
                port: self.smtp_port,
                username: non_empty(&self.smtp_username),
                password: self.smtp_password.clone(),
                security: SmtpSecurity::from_flag(self.smtp_use_tls, self.smtp_port),
                from,
                timeout: Duration::from_secs(self.smtp_timeout_seconds),
            },
            recipients,
        })
    }
}

/// Split a comma-separated address list, dropping blanks
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

//! SMTP relay for graphrelay
//!
//! Re-sends messages exactly as they were received: the raw RFC 822 bytes
//! are handed to the server after an explicit `MAIL FROM`/`RCPT TO`
//! envelope, so headers and encoded attachments are never rebuilt.

mod client;
mod error;

pub use client::{validate_addresses, SmtpConfig, SmtpRelay, SmtpSecurity};
pub use error::{SmtpError, SmtpResult};

//! SMTP relay configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const fn default_port() -> u16 {
    587
}

/// Connection security for the relay session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Security {
    /// Plaintext session (local relays and tests only)
    None,
    /// Plaintext connect upgraded via STARTTLS (typically port 587)
    #[default]
    StartTls,
    /// Implicit TLS from the first byte (typically port 465)
    Ssl,
}

/// Relay and mailbox configuration
///
/// The account password is deliberately absent: it is resolved per attempt
/// from `password_file` (or the `SMSWARD_SMTP_PASSWORD` environment variable
/// when no file is configured), so it never sits in the config snapshot and
/// a rotation takes effect without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Relay hostname
    pub host: String,

    /// Relay port
    ///
    /// Default: 587
    #[serde(default = "default_port")]
    pub port: u16,

    /// Session security mode
    ///
    /// Default: `StartTls`
    #[serde(default)]
    pub security: Security,

    /// Account username for AUTH
    pub username: String,

    /// File the account password is read from
    #[serde(default)]
    pub password_file: Option<PathBuf>,

    /// Envelope sender and Reply-To address
    pub from_email: String,

    /// Destination mailbox messages are forwarded to
    pub to_email: String,
}

impl SmtpConfig {
    /// Whether enough is configured to attempt a delivery
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
            && self.port != 0
            && !self.username.is_empty()
            && !self.from_email.is_empty()
            && !self.to_email.is_empty()
    }
}

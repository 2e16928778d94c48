//! The `Transport` implementation over lettre's async SMTP client.

use std::path::PathBuf;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials as AuthCredentials,
};
use smsward_common::message::MessageRecord;
use smsward_delivery::{CredentialSource, Credentials, Transport, TransportError};
use tracing::debug;

use crate::{
    compose::{Email, compose, compose_test_probe},
    config::{Security, SmtpConfig},
};

/// Environment variable consulted for the account password when no
/// `password_file` is configured
pub const PASSWORD_ENV: &str = "SMSWARD_SMTP_PASSWORD";

/// Credential source backed by the configured password file
///
/// The file is re-read on every resolution, so rotating the password on disk
/// takes effect on the next attempt. Falls back to [`PASSWORD_ENV`] (or an
/// empty password, which the relay will reject like any other bad
/// credential) when no file is configured.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    username: String,
    password_file: Option<PathBuf>,
}

impl FileCredentials {
    #[must_use]
    pub fn new(config: &SmtpConfig) -> Self {
        Self {
            username: config.username.clone(),
            password_file: config.password_file.clone(),
        }
    }
}

#[async_trait]
impl CredentialSource for FileCredentials {
    async fn resolve(&self) -> Result<Credentials, TransportError> {
        let password = match &self.password_file {
            Some(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| {
                    TransportError::new(format!(
                        "Cannot read password file {}: {e}",
                        path.display()
                    ))
                })?
                .trim_end()
                .to_string(),
            None => std::env::var(PASSWORD_ENV).unwrap_or_default(),
        };

        Ok(Credentials {
            username: self.username.clone(),
            password,
        })
    }
}

/// SMTP submission transport
///
/// Builds a fresh relay session per attempt; the scheduler serializes
/// attempts, so there is never more than one session open.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    #[must_use]
    pub const fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn relay(
        &self,
        credentials: &Credentials,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        let host = self.config.host.as_str();
        let builder = match self.config.security {
            Security::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            Security::Ssl => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            Security::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| TransportError::new(format!("Relay setup failed: {e}")))?;

        let builder = builder.port(self.config.port);
        let builder = if credentials.username.is_empty() {
            builder
        } else {
            builder.credentials(AuthCredentials::new(
                credentials.username.clone(),
                credentials.password.clone(),
            ))
        };

        Ok(builder.build())
    }

    async fn submit(&self, email: &Email, credentials: &Credentials) -> Result<(), TransportError> {
        let from = Mailbox::new(
            Some("smsward".to_string()),
            self.config
                .from_email
                .parse()
                .map_err(|e| TransportError::new(format!("Invalid from address: {e}")))?,
        );
        let to: Mailbox = self
            .config
            .to_email
            .parse()
            .map_err(|e| TransportError::new(format!("Invalid destination address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.text.clone(),
                email.html.clone(),
            ))
            .map_err(|e| TransportError::new(format!("Message build failed: {e}")))?;

        self.relay(credentials)?
            .send(message)
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        Ok(())
    }

    /// Send the fixed probe email to verify the relay settings
    pub async fn send_test_probe(&self, credentials: &Credentials) -> Result<(), TransportError> {
        debug!("Sending test probe to {}", self.config.to_email);
        self.submit(&compose_test_probe(), credentials).await
    }
}

#[async_trait]
impl Transport for SmtpMailer {
    async fn send(
        &self,
        message: &MessageRecord,
        credentials: &Credentials,
    ) -> Result<(), TransportError> {
        self.submit(&compose(message), credentials).await
    }
}

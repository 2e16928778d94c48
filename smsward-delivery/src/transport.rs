//! Outbound transport boundary.
//!
//! The queue core never speaks a mail protocol itself; it hands a message
//! record and freshly resolved credentials to a [`Transport`] and receives
//! either success or an opaque failure reason. All failure causes are treated
//! alike by the retry policy.

use async_trait::async_trait;
use smsward_common::message::MessageRecord;
use thiserror::Error;

/// A failed delivery attempt, carrying one display-safe reason string.
///
/// Transports map whatever their underlying protocol client reports (returned
/// failures and thrown errors alike) into this single shape.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(String);

impl TransportError {
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// The failure reason, suitable for display and for the queue item's
    /// `error` field.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Authentication material for one delivery attempt.
///
/// Resolved immediately before each attempt so a rotated password takes
/// effect without restarting the service.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Source of the current credentials.
#[async_trait]
pub trait CredentialSource: Send + Sync + std::fmt::Debug {
    /// Resolve the currently configured credentials.
    ///
    /// A resolution failure is treated exactly like a failed delivery
    /// attempt: the reason is recorded and the backoff schedule applies.
    async fn resolve(&self) -> Result<Credentials, TransportError>;
}

/// Fixed credentials, resolved once at construction.
#[derive(Debug, Clone)]
pub struct StaticCredentials(Credentials);

impl StaticCredentials {
    #[must_use]
    pub const fn new(credentials: Credentials) -> Self {
        Self(credentials)
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn resolve(&self) -> Result<Credentials, TransportError> {
        Ok(self.0.clone())
    }
}

/// Collaborator performing the actual outbound delivery.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Attempt to deliver one message.
    ///
    /// May take arbitrarily long; the scheduler serializes attempts, so at
    /// most one call is in flight at any time.
    async fn send(
        &self,
        message: &MessageRecord,
        credentials: &Credentials,
    ) -> Result<(), TransportError>;
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_displays_its_reason() {
        let err = TransportError::new("smtp timeout");
        assert_eq!(err.to_string(), "smtp timeout");
        assert_eq!(err.reason(), "smtp timeout");
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let credentials = Credentials {
            username: "forwarder@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("forwarder@example.com"));
        assert!(!rendered.contains("hunter2"));
    }

    #[tokio::test]
    async fn static_credentials_resolve_to_themselves() {
        let source = StaticCredentials::new(Credentials {
            username: "user".to_string(),
            password: "pass".to_string(),
        });
        let resolved = source.resolve().await.expect("static resolution");
        assert_eq!(resolved.username, "user");
        assert_eq!(resolved.password, "pass");
    }
}

//! SMTP submission transport
//!
//! Implements the delivery core's `Transport` boundary with a mail-submission
//! client: each observed message is composed into an email and handed to the
//! configured relay. The wire protocol lives entirely inside lettre; nothing
//! here frames SMTP itself.

pub mod compose;
pub mod config;
pub mod transport;

pub use compose::{Email, compose, compose_test_probe};
pub use config::{Security, SmtpConfig};
pub use transport::{FileCredentials, SmtpMailer};

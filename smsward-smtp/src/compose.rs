//! Email composition for forwarded messages.

use chrono::{DateTime, Local};
use smsward_common::message::MessageRecord;

/// A composed email, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Compose the forwarding email for one observed message
///
/// The body mirrors what the user saw on the device: sender, receiving line,
/// capture time, then the message text. The HTML part is the same body in a
/// monospaced block.
#[must_use]
pub fn compose(message: &MessageRecord) -> Email {
    let captured: DateTime<Local> = message.captured_at.into();
    let receiver = message.receiver.as_deref().unwrap_or("Unknown");

    let text = format!(
        "From: {sender}\n\
         To: {receiver} ({slot})\n\
         Time: {time}\n\
         \n\
         Message:\n\
         {body}",
        sender = message.sender,
        slot = message.slot_label(),
        time = captured.format("%Y-%m-%d %H:%M:%S"),
        body = message.body,
    );

    Email {
        subject: format!("SMS from {}", message.sender),
        html: format!(
            "<pre style=\"font-family: monospace;\">{}</pre>",
            escape_html(&text)
        ),
        text,
    }
}

/// Compose the probe email used to verify the relay settings
#[must_use]
pub fn compose_test_probe() -> Email {
    let text =
        "This is a test email from smsward. Your SMTP settings are working correctly!".to_string();

    Email {
        subject: "smsward - Test Connection".to_string(),
        html: format!("<p>{text}</p>"),
        text,
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

//! Normalization of raw platform events into canonical message records.

use std::sync::Arc;

use serde::Deserialize;
use smsward_common::{
    clock::Clock,
    ingest,
    message::{MessageId, MessageRecord},
};
use smsward_delivery::{DeliveryError, DeliveryQueue};
use thiserror::Error;

use crate::lines::LineRegistry;

/// A raw intercepted message event, as the platform hook reports it
///
/// `payload` is the bracketed `[sender, body]` string carried by the SMS
/// broadcast. The slot index is optional; hooks that cannot attribute a slot
/// omit it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSmsEvent {
    pub payload: String,
    #[serde(default)]
    pub slot: Option<u32>,
}

#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload did not match the `[sender, body]` shape.
    #[error("Malformed SMS payload: {0:?}")]
    MalformedPayload(String),

    /// The queue rejected the record.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Turns raw intercepted events into queue entries
///
/// Duplicate suppression is this component's responsibility, not the
/// queue's: every accepted event is stamped with a fresh id, so the same
/// physical message never reaches the queue twice through this path.
#[derive(Debug)]
pub struct SmsIngest {
    queue: DeliveryQueue,
    lines: LineRegistry,
    clock: Arc<dyn Clock>,
}

impl SmsIngest {
    #[must_use]
    pub fn new(queue: DeliveryQueue, lines: LineRegistry, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            lines,
            clock,
        }
    }

    /// Parse the bracketed broadcast payload
    ///
    /// Everything up to the first comma is the sender; the rest, with
    /// leading whitespace stripped, is the body (which may itself contain
    /// commas).
    fn parse_payload(payload: &str) -> Result<(&str, &str), IngestError> {
        let malformed = || IngestError::MalformedPayload(payload.to_string());

        let inner = payload
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(malformed)?;

        let (sender, body) = inner.split_once(',').ok_or_else(malformed)?;
        let sender = sender.trim();
        let body = body.trim_start();

        if sender.is_empty() || body.is_empty() {
            return Err(malformed());
        }

        Ok((sender, body))
    }

    /// Normalize one raw event and enqueue the resulting record
    ///
    /// Returns the accepted record's id. Malformed payloads are rejected
    /// without touching the queue.
    pub async fn observe(&self, event: RawSmsEvent) -> Result<MessageId, IngestError> {
        let (sender, body) = Self::parse_payload(&event.payload)?;
        let slot = event.slot.unwrap_or(0);

        let record = MessageRecord {
            id: MessageId::generate(),
            sender: sender.to_string(),
            body: body.to_string(),
            captured_at: self.clock.now(),
            slot,
            receiver: self.lines.receiver_for(slot),
        };
        let id = record.id;

        ingest!(level = DEBUG, "Observed message {id} from {sender}");
        self.queue.enqueue(record, self.clock.now()).await?;

        Ok(id)
    }
}

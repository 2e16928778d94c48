//! Canonical message record produced by ingest.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Identifier for an observed message
///
/// A globally unique identifier (ULID) assigned when ingest accepts a raw
/// event. ULIDs are lexicographically sortable by creation time and
/// collision-resistant, which makes them a deterministic final tie-break key
/// for queue ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId {
    id: ulid::Ulid,
}

impl MessageId {
    /// Create a message ID from an existing ULID
    #[must_use]
    pub const fn new(id: ulid::Ulid) -> Self {
        Self { id }
    }

    /// Generate a new unique message ID
    #[must_use]
    pub fn generate() -> Self {
        Self {
            id: ulid::Ulid::new(),
        }
    }

    /// Get the underlying ULID
    #[must_use]
    pub const fn ulid(&self) -> ulid::Ulid {
        self.id
    }

    /// Get the timestamp (milliseconds since Unix epoch) encoded in this ULID
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.id.timestamp_ms()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl std::str::FromStr for MessageId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ulid::Ulid::from_string(s).map(|id| Self { id })
    }
}

impl serde::Serialize for MessageId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.id.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let id = ulid::Ulid::from_string(&s).map_err(serde::de::Error::custom)?;
        Ok(Self { id })
    }
}

/// An observed SMS message, normalized by ingest
///
/// Immutable once created; the delivery queue wraps it without ever touching
/// its fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Unique identifier, assigned at ingest
    pub id: MessageId,
    /// Originating address (phone number) as reported by the platform
    pub sender: String,
    /// Message text
    pub body: String,
    /// When the message was observed
    pub captured_at: SystemTime,
    /// Zero-based slot index of the line the platform attributed the message to
    pub slot: u32,
    /// Receiving number, when it could be resolved
    ///
    /// `None` on multi-line devices, where the platform does not report which
    /// line received the message.
    pub receiver: Option<String>,
}

impl MessageRecord {
    /// Human-readable label for the receiving line slot (`SIM 1`, `SIM 2`, ...)
    #[must_use]
    pub fn slot_label(&self) -> String {
        format!("SIM {}", self.slot + 1)
    }
}

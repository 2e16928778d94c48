//! Queue state shared between the delivery core and the persistence layer.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::message::{MessageId, MessageRecord};

/// Delivery lifecycle status of a queued message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueStatus {
    /// Waiting for a delivery attempt (possibly in backoff)
    Pending,
    /// Attempts exhausted; only an explicit retry or dismissal moves it
    Failed,
}

/// Mutable delivery state wrapped around one message record
///
/// The item's identity is its message's id. All mutation happens through the
/// delivery queue's operations; nothing else touches these fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// The message being forwarded
    pub message: MessageRecord,
    /// Current lifecycle status
    pub status: QueueStatus,
    /// Delivery attempts made so far
    pub attempts: u32,
    /// When the most recent attempt was made
    pub last_attempt: Option<SystemTime>,
    /// Earliest time a new attempt may occur; always set while `Pending`
    pub next_retry: Option<SystemTime>,
    /// Reason reported by the most recent failed attempt
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a freshly enqueued item: pending, zero attempts, eligible now
    #[must_use]
    pub const fn new(message: MessageRecord, now: SystemTime) -> Self {
        Self {
            message,
            status: QueueStatus::Pending,
            attempts: 0,
            last_attempt: None,
            next_retry: Some(now),
            error: None,
        }
    }

    /// The item's identifier (identical to its message record's id)
    #[must_use]
    pub const fn id(&self) -> MessageId {
        self.message.id
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == QueueStatus::Pending
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == QueueStatus::Failed
    }

    /// Whether this item may be attempted at `now`
    #[must_use]
    pub fn eligible(&self, now: SystemTime) -> bool {
        self.is_pending() && self.next_retry.is_some_and(|at| at <= now)
    }
}

/// The full persisted queue snapshot: items in insertion order plus the
/// forwarded counter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueState {
    pub items: Vec<QueueItem>,
    /// Messages successfully forwarded over the lifetime of the install
    pub total_forwarded: u64,
}

impl QueueState {
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id() == id)
    }

    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Pending items, in insertion order
    pub fn pending(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter().filter(|item| item.is_pending())
    }

    /// Failed items, in insertion order
    pub fn failed(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter().filter(|item| item.is_failed())
    }
}

//! Typed error handling for queue operations.

use smsward_common::message::MessageId;
use smsward_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the delivery queue and scheduler.
///
/// Contract errors (duplicate or dangling ids, invalid state transitions)
/// indicate a caller bug; they abort the operation without touching the
/// persisted state and are logged rather than propagated as fatal. Store
/// errors abort the current operation and leave the pre-mutation state in
/// place, to be retried on the next tick.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// An item with this id is already queued.
    #[error("Duplicate queue item: {0}")]
    DuplicateId(MessageId),

    /// No item with this id exists in the queue.
    #[error("Message not found in queue: {0}")]
    NotFound(MessageId),

    /// The item is not pending, so an attempt outcome cannot be recorded.
    #[error("Item is not pending: {0}")]
    NotPending(MessageId),

    /// Only failed items may be reset for a manual retry.
    #[error("Item has not failed, refusing to reset: {0}")]
    NotFailed(MessageId),

    /// The persistence collaborator failed; the mutation was rolled back.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DeliveryError {
    /// Whether this is a caller-contract violation rather than an
    /// environmental failure.
    #[must_use]
    pub const fn is_contract(&self) -> bool {
        matches!(
            self,
            Self::DuplicateId(_) | Self::NotFound(_) | Self::NotPending(_) | Self::NotFailed(_)
        )
    }
}

//! Service trait abstraction for queue observation and control
//!
//! Decouples control surfaces (socket handlers, CLIs) from the concrete
//! queue implementation, so they can be tested against a mock and never grow
//! a dependency on scheduler internals.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smsward_common::{
    clock::Clock,
    message::MessageId,
    state::{QueueItem, QueueStatus},
};

use crate::{error::DeliveryError, queue::DeliveryQueue};

/// Point-in-time queue statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: usize,
    pub failed: usize,
    pub total_forwarded: u64,
}

/// Observer and manual-intervention surface over the delivery queue
#[async_trait]
pub trait QueueControlService: Send + Sync {
    /// Counts for display
    async fn stats(&self) -> QueueStats;

    /// Items in insertion order, optionally filtered by status
    async fn list(&self, status: Option<QueueStatus>) -> Vec<QueueItem>;

    /// User-triggered retry of a failed item
    async fn retry(&self, id: MessageId) -> Result<(), DeliveryError>;

    /// Dismiss an item without retrying; `true` if something was removed
    async fn dismiss(&self, id: MessageId) -> Result<bool, DeliveryError>;

    /// Dismiss every failed item, returning how many were removed
    async fn clear_failed(&self) -> Result<usize, DeliveryError>;
}

/// The production implementation, backed by the real queue
#[derive(Debug, Clone)]
pub struct QueueService {
    queue: DeliveryQueue,
    clock: Arc<dyn Clock>,
}

impl QueueService {
    #[must_use]
    pub fn new(queue: DeliveryQueue, clock: Arc<dyn Clock>) -> Self {
        Self { queue, clock }
    }
}

#[async_trait]
impl QueueControlService for QueueService {
    async fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.queue.list_pending().await.len(),
            failed: self.queue.list_failed().await.len(),
            total_forwarded: self.queue.total_forwarded().await,
        }
    }

    async fn list(&self, status: Option<QueueStatus>) -> Vec<QueueItem> {
        match status {
            None => self.queue.list_all().await,
            Some(QueueStatus::Pending) => self.queue.list_pending().await,
            Some(QueueStatus::Failed) => self.queue.list_failed().await,
        }
    }

    async fn retry(&self, id: MessageId) -> Result<(), DeliveryError> {
        self.queue.reset_for_retry(id, self.clock.now()).await
    }

    async fn dismiss(&self, id: MessageId) -> Result<bool, DeliveryError> {
        Ok(self.queue.remove(id).await?.is_some())
    }

    async fn clear_failed(&self) -> Result<usize, DeliveryError> {
        self.queue.clear_failed().await
    }
}

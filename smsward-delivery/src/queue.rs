//! Delivery queue management

use std::{sync::Arc, time::SystemTime};

use smsward_common::{
    delivery,
    message::{MessageId, MessageRecord},
    state::{QueueItem, QueueState, QueueStatus},
};
use smsward_store::StateStore;
use tokio::sync::Mutex;

use crate::{error::DeliveryError, policy::RetryPolicy};

/// Result of recording a failed delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retries remain; the item stays pending and becomes eligible again at
    /// `next_retry`
    Scheduled { next_retry: SystemTime },
    /// Attempts exhausted; the item is now failed. Carries the total failed
    /// count at this moment, for the notification payload
    Exhausted { failed_count: usize },
}

/// Authoritative store of in-flight and failed items
///
/// Single source of truth for retry eligibility. Every mutation funnels
/// through one commit path: the change is applied to a scratch copy, saved
/// durably through the state store, and only then published. A persistence
/// failure therefore leaves the observable state untouched. The internal
/// mutex gives the single-writer discipline the scheduler relies on:
/// concurrent enqueues from ingest and outcome recording from the scheduler
/// never interleave mid-mutation.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    state: Arc<Mutex<QueueState>>,
    store: Arc<dyn StateStore>,
    policy: RetryPolicy,
}

impl DeliveryQueue {
    /// Create an empty queue backed by `store`
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            store,
            policy,
        }
    }

    /// Restore the queue from the most recent snapshot in `store`
    ///
    /// Starts empty on first run.
    pub async fn restore(
        store: Arc<dyn StateStore>,
        policy: RetryPolicy,
    ) -> Result<Self, DeliveryError> {
        let state = store.load().await?.unwrap_or_default();
        if !state.items.is_empty() {
            delivery!(
                level = INFO,
                "Restored {} queued item(s) from the state store",
                state.items.len()
            );
        }

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            store,
            policy,
        })
    }

    /// Apply `mutate` to a scratch copy, persist it, then publish it.
    ///
    /// An `Err` from the closure aborts before the save; an `Err` from the
    /// save discards the scratch copy. Either way the published state is
    /// exactly what it was before the call.
    async fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut QueueState) -> Result<T, DeliveryError> + Send,
    ) -> Result<T, DeliveryError> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = mutate(&mut next)?;
        self.store.save(&next).await?;
        *state = next;
        Ok(out)
    }

    /// Insert a newly observed message: pending, zero attempts, eligible now
    ///
    /// Ingest guarantees id uniqueness upstream; a duplicate id here is a
    /// contract violation and leaves the queue unchanged.
    pub async fn enqueue(
        &self,
        message: MessageRecord,
        now: SystemTime,
    ) -> Result<(), DeliveryError> {
        let id = message.id;
        self.commit(move |state| {
            if state.contains(id) {
                return Err(DeliveryError::DuplicateId(id));
            }
            state.items.push(QueueItem::new(message, now));
            Ok(())
        })
        .await
    }

    /// The single pending item due for an attempt at `now`, if any
    ///
    /// Selection order: smallest `next_retry` first; on identical
    /// `next_retry`, the lower attempt count wins; if still tied, the lowest
    /// id (ULIDs are totally ordered, so the choice is deterministic). The
    /// scheduler processes one item per tick, so under sustained load items
    /// are serviced in retry order, not arrival order.
    pub async fn next_eligible(&self, now: SystemTime) -> Option<QueueItem> {
        let state = self.state.lock().await;
        state
            .pending()
            .filter(|item| item.eligible(now))
            .min_by_key(|item| (item.next_retry, item.attempts, item.id()))
            .cloned()
    }

    /// Record a successful delivery: remove the item and bump the forwarded
    /// counter, atomically
    ///
    /// A no-op when the id is absent: delivering the outcome is idempotent
    /// from the caller's perspective, so a duplicate success report must not
    /// double-count.
    pub async fn record_success(&self, id: MessageId) -> Result<(), DeliveryError> {
        let result = self
            .commit(move |state| {
                let Some(index) = state.items.iter().position(|item| item.id() == id) else {
                    return Err(DeliveryError::NotFound(id));
                };
                state.items.remove(index);
                state.total_forwarded += 1;
                Ok(())
            })
            .await;

        match result {
            Err(DeliveryError::NotFound(_)) => {
                delivery!(
                    level = DEBUG,
                    "Success recorded for unknown item {id}, ignoring"
                );
                Ok(())
            }
            other => other,
        }
    }

    /// Record a failed delivery attempt
    ///
    /// Increments the attempt count and either schedules the next retry per
    /// the backoff table or, once attempts are exhausted, parks the item as
    /// failed with the reason attached.
    pub async fn record_failure(
        &self,
        id: MessageId,
        reason: &str,
        now: SystemTime,
    ) -> Result<FailureOutcome, DeliveryError> {
        let policy = self.policy.clone();
        let reason = reason.to_string();
        self.commit(move |state| {
            let Some(item) = state.get_mut(id) else {
                return Err(DeliveryError::NotFound(id));
            };
            if !item.is_pending() {
                return Err(DeliveryError::NotPending(id));
            }

            item.attempts += 1;
            item.last_attempt = Some(now);
            item.error = Some(reason);

            if policy.should_retry(item.attempts) {
                let next_retry = policy.next_retry(now, item.attempts);
                item.next_retry = Some(next_retry);
                Ok(FailureOutcome::Scheduled { next_retry })
            } else {
                item.status = QueueStatus::Failed;
                item.next_retry = None;
                let failed_count = state.failed().count();
                Ok(FailureOutcome::Exhausted { failed_count })
            }
        })
        .await
    }

    /// Reset a failed item for a user-triggered retry: pending again, zero
    /// attempts, eligible immediately
    ///
    /// Only valid on failed items.
    pub async fn reset_for_retry(
        &self,
        id: MessageId,
        now: SystemTime,
    ) -> Result<(), DeliveryError> {
        self.commit(move |state| {
            let Some(item) = state.get_mut(id) else {
                return Err(DeliveryError::NotFound(id));
            };
            if !item.is_failed() {
                return Err(DeliveryError::NotFailed(id));
            }

            item.status = QueueStatus::Pending;
            item.attempts = 0;
            item.last_attempt = None;
            item.next_retry = Some(now);
            item.error = None;
            Ok(())
        })
        .await
    }

    /// Unconditionally delete an item (dismissal without retrying)
    ///
    /// Returns the removed item, or `None` if the id was already gone.
    pub async fn remove(&self, id: MessageId) -> Result<Option<QueueItem>, DeliveryError> {
        let result = self
            .commit(move |state| {
                let Some(index) = state.items.iter().position(|item| item.id() == id) else {
                    return Err(DeliveryError::NotFound(id));
                };
                Ok(state.items.remove(index))
            })
            .await;

        match result {
            Ok(item) => Ok(Some(item)),
            Err(DeliveryError::NotFound(_)) => {
                delivery!(level = DEBUG, "Removal of unknown item {id}, ignoring");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove every failed item, returning how many were dropped
    pub async fn clear_failed(&self) -> Result<usize, DeliveryError> {
        self.commit(|state| {
            let before = state.items.len();
            state.items.retain(|item| !item.is_failed());
            Ok(before - state.items.len())
        })
        .await
    }

    /// Point-in-time snapshot of pending items, in insertion order
    pub async fn list_pending(&self) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        state.pending().cloned().collect()
    }

    /// Point-in-time snapshot of failed items, in insertion order
    pub async fn list_failed(&self) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        state.failed().cloned().collect()
    }

    /// Point-in-time snapshot of every item, in insertion order
    pub async fn list_all(&self) -> Vec<QueueItem> {
        let state = self.state.lock().await;
        state.items.clone()
    }

    /// Look up a single item
    pub async fn get(&self, id: MessageId) -> Option<QueueItem> {
        let state = self.state.lock().await;
        state.get(id).cloned()
    }

    /// Number of items currently queued (pending and failed)
    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Messages successfully forwarded over the lifetime of the install
    pub async fn total_forwarded(&self) -> u64 {
        self.state.lock().await.total_forwarded
    }
}

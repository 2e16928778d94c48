//! Integration tests for the delivery queue state machine.
#![allow(clippy::expect_used, clippy::unwrap_used)]

mod support;

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use smsward_common::state::QueueStatus;
use smsward_delivery::{DeliveryError, DeliveryQueue, FailureOutcome, RetryPolicy};
use smsward_store::MemoryStateStore;
use support::record;

fn epoch(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn queue() -> (DeliveryQueue, Arc<MemoryStateStore>) {
    let store = Arc::new(MemoryStateStore::new());
    let queue = DeliveryQueue::new(store.clone(), RetryPolicy::default());
    (queue, store)
}

#[tokio::test]
async fn repeated_failures_exhaust_into_failed() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");

    for attempt in 1..=2 {
        let outcome = queue
            .record_failure(id, "smtp timeout", t0)
            .await
            .expect("record failure");
        assert!(matches!(outcome, FailureOutcome::Scheduled { .. }));
        let item = queue.get(id).await.expect("still queued");
        assert_eq!(item.attempts, attempt);
        assert_eq!(item.status, QueueStatus::Pending);
    }

    let outcome = queue
        .record_failure(id, "connection refused", t0)
        .await
        .expect("record failure");
    assert_eq!(outcome, FailureOutcome::Exhausted { failed_count: 1 });

    let item = queue.get(id).await.expect("still queued");
    assert_eq!(item.status, QueueStatus::Failed);
    assert_eq!(item.attempts, 3);
    assert_eq!(item.error.as_deref(), Some("connection refused"));
    assert!(item.next_retry.is_none());
}

#[tokio::test]
async fn next_eligible_honors_backoff() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");

    // Freshly enqueued items are immediately eligible
    assert_eq!(queue.next_eligible(t0).await.map(|i| i.id()), Some(id));

    // First failure schedules the retry 30s out
    queue
        .record_failure(id, "smtp timeout", t0)
        .await
        .expect("record failure");

    assert!(queue.next_eligible(t0).await.is_none());
    assert!(
        queue
            .next_eligible(t0 + Duration::from_secs(29))
            .await
            .is_none()
    );
    assert_eq!(
        queue
            .next_eligible(t0 + Duration::from_secs(30))
            .await
            .map(|i| i.id()),
        Some(id)
    );
}

#[tokio::test]
async fn backoff_schedule_follows_the_fixed_table() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");

    let outcome = queue
        .record_failure(id, "smtp timeout", t0)
        .await
        .expect("first failure");
    assert_eq!(
        outcome,
        FailureOutcome::Scheduled {
            next_retry: t0 + Duration::from_secs(30)
        }
    );

    let t1 = t0 + Duration::from_secs(30);
    let outcome = queue
        .record_failure(id, "smtp timeout", t1)
        .await
        .expect("second failure");
    assert_eq!(
        outcome,
        FailureOutcome::Scheduled {
            next_retry: t1 + Duration::from_secs(120)
        }
    );

    let item = queue.get(id).await.expect("still queued");
    assert_eq!(item.attempts, 2);
    assert_eq!(item.last_attempt, Some(t1));
}

#[tokio::test]
async fn success_removes_and_counts_exactly_once() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");
    queue.record_success(id).await.expect("record success");

    assert!(queue.next_eligible(t0).await.is_none());
    assert!(queue.get(id).await.is_none());
    assert_eq!(queue.total_forwarded().await, 1);

    // A duplicate outcome report must not double-increment the counter
    queue.record_success(id).await.expect("idempotent success");
    assert_eq!(queue.total_forwarded().await, 1);
}

#[tokio::test]
async fn counter_is_unaffected_by_failure_and_dismissal() {
    let (queue, _) = queue();
    let first = record("+15550001111", "one");
    let second = record("+15550002222", "two");
    let second_id = second.id;
    let t0 = epoch(1000);

    queue.enqueue(first, t0).await.expect("enqueue");
    queue.enqueue(second, t0).await.expect("enqueue");

    queue
        .record_failure(second_id, "smtp timeout", t0)
        .await
        .expect("record failure");
    queue.remove(second_id).await.expect("remove");

    assert_eq!(queue.total_forwarded().await, 0);
}

#[tokio::test]
async fn reset_for_retry_restores_a_failed_item() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");
    for _ in 0..3 {
        queue
            .record_failure(id, "smtp timeout", t0)
            .await
            .expect("record failure");
    }
    assert!(queue.get(id).await.expect("queued").is_failed());

    let t1 = t0 + Duration::from_secs(600);
    queue.reset_for_retry(id, t1).await.expect("reset");

    let item = queue.get(id).await.expect("queued");
    assert_eq!(item.status, QueueStatus::Pending);
    assert_eq!(item.attempts, 0);
    assert!(item.error.is_none());
    assert!(item.next_retry.expect("pending has next_retry") <= t1);

    // Immediately eligible again
    assert_eq!(queue.next_eligible(t1).await.map(|i| i.id()), Some(id));
}

#[tokio::test]
async fn reset_for_retry_rejects_pending_items() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");

    let err = queue
        .reset_for_retry(id, t0)
        .await
        .expect_err("pending item cannot be reset");
    assert!(matches!(err, DeliveryError::NotFailed(_)));
    assert!(err.is_contract());
}

#[tokio::test]
async fn duplicate_enqueue_is_rejected() {
    let (queue, _) = queue();
    let message = record("+15550001111", "hello");
    let t0 = epoch(1000);

    queue.enqueue(message.clone(), t0).await.expect("enqueue");
    let err = queue
        .enqueue(message, t0)
        .await
        .expect_err("duplicate id must be rejected");
    assert!(matches!(err, DeliveryError::DuplicateId(_)));
    assert_eq!(queue.len().await, 1);
}

#[tokio::test]
async fn tie_break_prefers_fewer_attempts() {
    let (queue, _) = queue();
    let a = record("+15550001111", "a");
    let b = record("+15550002222", "b");
    let a_id = a.id;
    let b_id = b.id;
    let t0 = epoch(1000);

    queue.enqueue(a, t0).await.expect("enqueue a");
    queue.enqueue(b, t0).await.expect("enqueue b");

    // Give B one attempt whose backoff lands exactly back on t0, so both
    // items share the same next_retry
    queue
        .record_failure(b_id, "smtp timeout", t0 - Duration::from_secs(30))
        .await
        .expect("record failure");

    let a_item = queue.get(a_id).await.expect("a queued");
    let b_item = queue.get(b_id).await.expect("b queued");
    assert_eq!(a_item.next_retry, b_item.next_retry);

    // Same next_retry: the lower attempt count wins
    assert_eq!(queue.next_eligible(t0).await.map(|i| i.id()), Some(a_id));
}

#[tokio::test]
async fn tie_break_falls_back_to_lowest_id() {
    let (queue, _) = queue();
    let a = record("+15550001111", "a");
    let b = record("+15550002222", "b");
    let expected = a.id.min(b.id);
    let t0 = epoch(1000);

    queue.enqueue(a, t0).await.expect("enqueue a");
    queue.enqueue(b, t0).await.expect("enqueue b");

    // Same next_retry, same attempt count: lowest id, deterministically
    assert_eq!(
        queue.next_eligible(t0).await.map(|i| i.id()),
        Some(expected)
    );
}

#[tokio::test]
async fn listings_preserve_insertion_order() {
    let (queue, _) = queue();
    let t0 = epoch(1000);
    let mut ids = Vec::new();

    for i in 0..4 {
        let message = record(&format!("+1555000{i:04}"), "msg");
        ids.push(message.id);
        queue.enqueue(message, t0).await.expect("enqueue");
    }

    // Fail the second item out entirely
    for _ in 0..3 {
        queue
            .record_failure(ids[1], "smtp timeout", t0)
            .await
            .expect("record failure");
    }

    let pending: Vec<_> = queue.list_pending().await.iter().map(|i| i.id()).collect();
    assert_eq!(pending, vec![ids[0], ids[2], ids[3]]);

    let failed: Vec<_> = queue.list_failed().await.iter().map(|i| i.id()).collect();
    assert_eq!(failed, vec![ids[1]]);
}

#[tokio::test]
async fn clear_failed_removes_only_failed_items() {
    let (queue, _) = queue();
    let t0 = epoch(1000);
    let keep = record("+15550001111", "keep");
    let drop = record("+15550002222", "drop");
    let keep_id = keep.id;
    let drop_id = drop.id;

    queue.enqueue(keep, t0).await.expect("enqueue");
    queue.enqueue(drop, t0).await.expect("enqueue");
    for _ in 0..3 {
        queue
            .record_failure(drop_id, "smtp timeout", t0)
            .await
            .expect("record failure");
    }

    let cleared = queue.clear_failed().await.expect("clear failed");
    assert_eq!(cleared, 1);
    assert!(queue.get(drop_id).await.is_none());
    assert!(queue.get(keep_id).await.is_some());
}

#[tokio::test]
async fn mutating_unknown_ids_is_a_quiet_no_op_where_the_contract_allows() {
    let (queue, _) = queue();
    let ghost = record("+15550009999", "ghost").id;
    let t0 = epoch(1000);

    // Dismissal and success reporting tolerate an already-removed id
    assert!(queue.remove(ghost).await.expect("remove").is_none());
    queue.record_success(ghost).await.expect("success no-op");
    assert_eq!(queue.total_forwarded().await, 0);

    // Failure recording does not: the scheduler only reports outcomes for
    // items it was handed
    let err = queue
        .record_failure(ghost, "smtp timeout", t0)
        .await
        .expect_err("unknown id");
    assert!(matches!(err, DeliveryError::NotFound(_)));
}

#[tokio::test]
async fn state_survives_a_restart() {
    let store = Arc::new(MemoryStateStore::new());
    let t0 = epoch(1000);

    {
        let queue = DeliveryQueue::new(store.clone(), RetryPolicy::default());
        let delivered = record("+15550001111", "delivered");
        let parked = record("+15550002222", "parked");
        let waiting = record("+15550003333", "waiting");
        let delivered_id = delivered.id;
        let parked_id = parked.id;

        queue.enqueue(delivered, t0).await.expect("enqueue");
        queue.enqueue(parked, t0).await.expect("enqueue");
        queue.enqueue(waiting, t0).await.expect("enqueue");

        queue.record_success(delivered_id).await.expect("success");
        for _ in 0..3 {
            queue
                .record_failure(parked_id, "smtp timeout", t0)
                .await
                .expect("record failure");
        }
    }

    // A fresh queue over the same store sees the same world
    let restored = DeliveryQueue::restore(store, RetryPolicy::default())
        .await
        .expect("restore");

    assert_eq!(restored.total_forwarded().await, 1);
    assert_eq!(restored.len().await, 2);
    assert_eq!(restored.list_pending().await.len(), 1);
    assert_eq!(restored.list_failed().await.len(), 1);

    let failed = &restored.list_failed().await[0];
    assert_eq!(failed.attempts, 3);
    assert_eq!(failed.error.as_deref(), Some("smtp timeout"));
}

#[tokio::test]
async fn failed_save_rolls_the_mutation_back() {
    let store = support::FlakyStateStore::new();
    let queue = DeliveryQueue::new(store.clone(), RetryPolicy::default());
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");

    store.fail_saves(true);
    let err = queue
        .record_failure(id, "smtp timeout", t0)
        .await
        .expect_err("save failure propagates");
    assert!(matches!(err, DeliveryError::Store(_)));

    // The observable state is exactly what it was before the failed mutation
    let item = queue.get(id).await.expect("still queued");
    assert_eq!(item.attempts, 0);
    assert!(item.error.is_none());
    let persisted = store.snapshot().expect("enqueue was persisted");
    assert_eq!(persisted.items[0].attempts, 0);

    // Once the store heals, the same mutation goes through
    store.fail_saves(false);
    queue
        .record_failure(id, "smtp timeout", t0)
        .await
        .expect("record failure");
    assert_eq!(queue.get(id).await.expect("queued").attempts, 1);
}

#[tokio::test]
async fn every_mutation_is_persisted_before_it_commits() {
    let (queue, store) = queue();
    let message = record("+15550001111", "hello");
    let id = message.id;
    let t0 = epoch(1000);

    queue.enqueue(message, t0).await.expect("enqueue");
    assert_eq!(store.snapshot().expect("snapshot").items.len(), 1);

    queue
        .record_failure(id, "smtp timeout", t0)
        .await
        .expect("record failure");
    assert_eq!(store.snapshot().expect("snapshot").items[0].attempts, 1);

    queue.record_success(id).await.expect("record success");
    let persisted = store.snapshot().expect("snapshot");
    assert!(persisted.items.is_empty());
    assert_eq!(persisted.total_forwarded, 1);
}

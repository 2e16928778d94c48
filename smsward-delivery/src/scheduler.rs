//! Scheduler loop driving queue items to delivery.

use std::{sync::Arc, time::Duration};

use serde::Deserialize;
use smsward_common::{Signal, clock::Clock, delivery, internal, message::MessageId};
use tracing::error;

use crate::{
    error::DeliveryError,
    notifier::Notifier,
    policy::RetryPolicy,
    queue::{DeliveryQueue, FailureOutcome},
    transport::{CredentialSource, Transport},
};

const fn default_tick_interval() -> u64 {
    5
}

/// Scheduler and retry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often to poll the queue for an eligible item (in seconds)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    /// Attempt ceiling and backoff table
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Recurring control loop that drives queued items through the transport
///
/// One attempt per tick, strictly serialized: the next attempt never begins
/// before the previous outcome is recorded. Eligibility is polled, not
/// event-driven, so each backoff step can land up to one tick interval late.
#[derive(Debug)]
pub struct DeliveryScheduler {
    tick_interval: Duration,
    queue: DeliveryQueue,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl DeliveryScheduler {
    #[must_use]
    pub fn new(
        config: &SchedulerConfig,
        queue: DeliveryQueue,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tick_interval: Duration::from_secs(config.tick_interval_secs),
            queue,
            transport,
            credentials,
            notifier,
            clock,
        }
    }

    /// Get a handle to the delivery queue
    #[must_use]
    pub const fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Run the scheduler until a shutdown signal arrives
    ///
    /// Each tick is isolated: an error aborts that tick (leaving the queue
    /// exactly as it was before the failed mutation, to be retried next tick)
    /// and the loop continues. Shutdown interrupts the inter-tick sleep
    /// promptly; an attempt already in flight completes and has its outcome
    /// recorded before the loop exits, so no item is ever left half-recorded.
    pub async fn serve(&self, mut shutdown: tokio::sync::broadcast::Receiver<Signal>) {
        internal!("Delivery scheduler starting");

        loop {
            tokio::select! {
                () = self.clock.sleep(self.tick_interval) => {
                    if let Err(e) = self.tick().await {
                        error!("Error processing delivery queue: {e}");
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(Signal::Shutdown | Signal::Finalised) => {
                            internal!("Delivery scheduler received shutdown signal");
                            break;
                        }
                        Err(e) => {
                            error!("Delivery scheduler shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        internal!("Delivery scheduler shutdown complete");
    }

    /// Drive one poll cycle: attempt at most one eligible item
    ///
    /// Returns the attempted item's id, or `None` when nothing was due.
    pub async fn tick(&self) -> Result<Option<MessageId>, DeliveryError> {
        let now = self.clock.now();
        let Some(item) = self.queue.next_eligible(now).await else {
            return Ok(None);
        };

        let id = item.id();
        delivery!(
            level = DEBUG,
            "Attempting delivery of {id} (attempt {})",
            item.attempts + 1
        );

        // A credential resolution failure counts as a failed attempt: the
        // reason is recorded and the same backoff applies
        let outcome = match self.credentials.resolve().await {
            Ok(credentials) => self.transport.send(&item.message, &credentials).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                self.queue.record_success(id).await?;
                delivery!(
                    level = INFO,
                    "Forwarded message {id} from {}",
                    item.message.sender
                );
            }
            Err(failure) => {
                delivery!(level = WARN, "Delivery of {id} failed: {failure}");
                match self
                    .queue
                    .record_failure(id, failure.reason(), self.clock.now())
                    .await?
                {
                    FailureOutcome::Scheduled { .. } => {}
                    FailureOutcome::Exhausted { failed_count } => {
                        delivery!(
                            level = WARN,
                            "Message {id} exhausted its delivery attempts"
                        );
                        self.notifier.notify_exhausted(failed_count).await;
                    }
                }
            }
        }

        Ok(Some(id))
    }
}

//! Exhaustion notification boundary.

use async_trait::async_trait;
use tracing::warn;

/// Collaborator informing the user that an item ran out of retries.
///
/// Fire-and-forget: invoked exactly once per item transitioning into the
/// failed state, with the total failed count at that moment.
#[async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    async fn notify_exhausted(&self, failed_count: usize);
}

/// Default notifier: logs at WARN.
///
/// Platform notification delivery (system tray, push, ...) is a host concern;
/// hosts wrap their mechanism in this trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_exhausted(&self, failed_count: usize) {
        warn!("{failed_count} message(s) failed to forward and need attention");
    }
}

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use smsward_common::state::QueueState;

use crate::{Result, StateStore};

/// In-memory state store
///
/// Holds the latest snapshot behind an `RwLock`. Primarily intended for
/// testing and for running without durable state (messages queued before a
/// crash are lost, matching the "no guarantees across reinstall" posture).
///
/// # Concurrency
/// Uses an `RwLock` for interior mutability and recovers gracefully if the
/// lock is poisoned by taking the underlying data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    snapshot: Arc<RwLock<Option<QueueState>>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently saved snapshot, for test assertions
    #[must_use]
    pub fn snapshot(&self) -> Option<QueueState> {
        self.snapshot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<Option<QueueState>> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &QueueState) -> Result<()> {
        let mut snapshot = self.snapshot.write()?;
        *snapshot = Some(state.clone());
        Ok(())
    }
}

//! Persistence boundary for the delivery queue.
//!
//! The queue's full state (items plus the forwarded counter) must survive
//! process restarts. The core depends only on the [`StateStore`] snapshot
//! semantics here; which storage technology backs it is a configuration
//! concern.

pub mod backends;
pub mod config;
pub mod error;

use async_trait::async_trait;
use smsward_common::state::QueueState;

pub use backends::{FileStateStore, MemoryStateStore};
pub use config::StoreConfig;
pub use error::{Result, SerializationError, StoreError, ValidationError};

/// Durable snapshot storage for the queue state
///
/// `save` must be durable before it returns: the queue treats a completed
/// `save` as the commit point of every mutating operation.
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Load the most recently saved state, or `None` on first run
    async fn load(&self) -> Result<Option<QueueState>>;

    /// Persist a full snapshot, replacing any previous one
    async fn save(&self, state: &QueueState) -> Result<()>;
}

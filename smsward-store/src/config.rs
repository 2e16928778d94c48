use std::sync::Arc;

use serde::Deserialize;

use crate::{FileStateStore, MemoryStateStore, Result, StateStore};

/// Configuration for the queue-state store
///
/// Allows runtime selection of the backing implementation through the
/// configuration file.
///
/// File-backed store in RON config:
/// ```ron
/// store: File(( path: "/var/lib/smsward/queue.bin" )),
/// ```
///
/// Memory-backed store (nothing survives a restart):
/// ```ron
/// store: Memory,
/// ```
#[derive(Debug, Clone, Deserialize)]
pub enum StoreConfig {
    /// File-based snapshot (production)
    File(FileStateStore),
    /// Memory-based snapshot (testing/development)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::File(FileStateStore::default())
    }
}

impl StoreConfig {
    /// Prepare the configured backend (directory creation, crash cleanup)
    pub fn init(&self) -> Result<()> {
        match self {
            Self::File(store) => store.init(),
            Self::Memory => Ok(()),
        }
    }

    /// Convert the configuration into a concrete store
    #[must_use]
    pub fn into_state_store(self) -> Arc<dyn StateStore> {
        match self {
            Self::File(store) => Arc::new(store),
            Self::Memory => Arc::new(MemoryStateStore::new()),
        }
    }
}

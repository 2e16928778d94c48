//! Error types for the smsward-store crate.

use std::io;

use thiserror::Error;

/// Top-level store error type.
///
/// All persistence operations return this error type, which categorizes
/// failures into I/O, serialization, and validation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O operation failed (snapshot read/write/rename).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Store path validation failed.
    #[error("Store validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serialization and deserialization errors.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Bincode serialization failed.
    #[error("Bincode encode error: {0}")]
    Encode(#[from] bincode::error::EncodeError),

    /// Bincode deserialization failed.
    #[error("Bincode decode error: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    /// Snapshot data is corrupted or incomplete.
    #[error("Corrupted snapshot: {0}")]
    Corrupted(String),
}

/// Store path validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Snapshot path is not absolute.
    #[error("Store path must be absolute: {0}")]
    NotAbsolute(String),

    /// Snapshot path contains directory traversal components.
    #[error("Store path cannot contain '..' components: {0}")]
    Traversal(String),

    /// Snapshot path points at a directory.
    #[error("Store path is a directory, expected a file: {0}")]
    IsDirectory(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

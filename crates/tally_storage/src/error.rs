//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key cannot be used with this store.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A stored value is unreadable.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store directory.
    #[error("storage directory is locked by another process: {0}")]
    Locked(String),
}

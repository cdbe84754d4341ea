//! Error types for the sync crate.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while queueing or replaying operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The remote store rejected or failed an operation.
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
    },

    /// Local persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] tally_storage::StorageError),

    /// The queue document could not be encoded or decoded.
    #[error("queue document error: {0}")]
    Core(#[from] tally_core::CoreError),

    /// The remote store is not reachable.
    #[error("not connected to remote")]
    NotConnected,
}

impl SyncError {
    /// Creates a remote error.
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}

//! Error types for Tally core.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// JSON encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The queue document was written by a newer format.
    #[error("unsupported queue format version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the document.
        found: u32,
        /// Highest version this build reads.
        supported: u32,
    },

    /// A custom date range ends before it starts.
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange {
        /// Range start.
        start: NaiveDate,
        /// Range end.
        end: NaiveDate,
    },

    /// A date range name was not recognised.
    #[error("unknown date range: {0}")]
    UnknownRange(String),
}

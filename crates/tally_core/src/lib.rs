//! # Tally Core
//!
//! Domain types shared by every Tally crate.
//!
//! This crate provides:
//! - [`TransactionRecord`] for recorded sales and expenses
//! - [`Operation`] and [`QueuedOperation`] for pending local mutations
//! - The queue document codec (JSON, versioned envelope)
//! - Date-range statistics over transaction records
//!
//! This is a pure crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod operation;
mod stats;
mod transaction;

pub use document::{decode_queue, encode_queue, QUEUE_FORMAT_VERSION};
pub use error::{CoreError, CoreResult};
pub use operation::{Operation, OperationKind, QueuedOperation};
pub use stats::{summarize, CategoryTotal, DateRange, Summary, UNCATEGORIZED};
pub use transaction::{TransactionId, TransactionKind, TransactionRecord};

//! # Tally Storage
//!
//! Local persistence for Tally, the on-device counterpart of a browser's
//! local storage.
//!
//! Backends are **opaque string stores**: a value is written and read back
//! as a whole under a single key. They know nothing about queue documents or
//! transaction records.
//!
//! ## Design Principles
//!
//! - Whole-value replacement only (no partial or delta writes)
//! - No knowledge of the documents stored under a key
//! - Must be `Send + Sync` so a store can be shared behind an `Arc`
//!
//! ## Available Backends
//!
//! - [`InMemoryStore`] - For tests and ephemeral sessions
//! - [`FileStore`] - One file per key inside a locked directory
//!
//! ## Example
//!
//! ```rust
//! use tally_storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set("tally:offline-queue", "[]").unwrap();
//! assert_eq!(store.get("tally:offline-queue").unwrap().as_deref(), Some("[]"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::KeyValueStore;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;

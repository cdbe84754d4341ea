//! CLI command implementations.

pub mod enqueue;
pub mod queue;
pub mod replay;
pub mod stats;

use std::path::Path;
use std::sync::Arc;
use tally_storage::FileStore;
use tally_sync::QueueStore;

/// Opens the data directory store.
pub fn open_store(path: &Path) -> Result<Arc<FileStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(FileStore::open(path)?))
}

/// Opens the offline queue kept in the data directory.
pub fn open_queue(store: &Arc<FileStore>) -> QueueStore<Arc<FileStore>> {
    QueueStore::with_defaults(Arc::clone(store))
}

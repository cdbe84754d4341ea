//! Persistent queue store.
//!
//! The queue lives in memory and is written through to a [`KeyValueStore`]
//! as one document on every mutation. There is no partial write and no index;
//! lookups by id are linear scans.

use crate::config::QueueConfig;
use crate::error::SyncResult;
use parking_lot::Mutex;
use std::collections::HashMap;
use tally_core::{decode_queue, encode_queue, Operation, QueuedOperation};
use tally_storage::KeyValueStore;

/// Appended to the storage key to name the copy of a document that could
/// not be read.
pub const UNREADABLE_SUFFIX: &str = ":unreadable";

/// What happened to one snapshot entry during a processing pass.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Applied remotely; remove from the queue.
    Applied,
    /// Failed; keep it with the new retry count.
    Retry {
        /// Retry count after this failure.
        retry_count: u32,
    },
    /// Retries exhausted; remove from the queue.
    Dropped,
}

/// Durable, ordered list of pending operations.
///
/// Construct one per process and share it by reference or `Arc`. Reads and
/// writes are serialized by an internal mutex that is never held across an
/// `.await`.
pub struct QueueStore<S: KeyValueStore> {
    backend: S,
    config: QueueConfig,
    entries: Mutex<Vec<QueuedOperation>>,
}

impl<S: KeyValueStore> QueueStore<S> {
    /// Opens the queue persisted in `backend`.
    ///
    /// An unreadable or undecodable document is logged and treated as an
    /// empty queue. An undecodable document is first copied to
    /// `<storage_key>:unreadable` so the next write does not destroy it.
    /// Entries sharing an id get fresh ids.
    pub fn open(backend: S, config: QueueConfig) -> Self {
        let mut entries = load(&backend, &config.storage_key);
        let renewed = renew_duplicate_ids(&mut entries);
        tracing::debug!(
            key = %config.storage_key,
            pending = entries.len(),
            "opened offline queue"
        );

        let queue = Self {
            backend,
            config,
            entries: Mutex::new(entries),
        };
        if renewed > 0 {
            let entries = queue.entries.lock();
            if let Err(e) = queue.persist(&entries) {
                tracing::error!(error = %e, "failed to persist renewed queue ids");
            }
        }
        queue
    }

    /// Opens the queue under the default key.
    pub fn with_defaults(backend: S) -> Self {
        Self::open(backend, QueueConfig::default())
    }

    /// Returns the storage backend.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Returns the storage key.
    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    /// Appends `operation` and persists the queue.
    ///
    /// Never fails: a persistence error is logged and the entry is kept in
    /// memory, to be written with the next successful mutation.
    pub fn enqueue(&self, operation: Operation) -> String {
        let (id, result) = self.push(operation);
        if let Err(e) = result {
            tracing::error!(op_id = %id, error = %e, "failed to persist offline queue");
        }
        id
    }

    /// Appends `operation` and persists the queue, reporting persistence
    /// errors.
    ///
    /// The entry stays queued in memory even when an error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue document cannot be encoded or written.
    pub fn try_enqueue(&self, operation: Operation) -> SyncResult<String> {
        let (id, result) = self.push(operation);
        result.map(|()| id)
    }

    fn push(&self, operation: Operation) -> (String, SyncResult<()>) {
        let mut entry = QueuedOperation::new(operation);
        let mut entries = self.entries.lock();
        while entries.iter().any(|queued| queued.id == entry.id) {
            entry.renew_id();
        }
        let id = entry.id.clone();
        tracing::debug!(op_id = %id, kind = %entry.kind(), "enqueued operation");

        entries.push(entry);
        let result = self.persist(&entries);
        (id, result)
    }

    /// Returns the number of pending operations.
    pub fn count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns an ordered copy of the queue.
    pub fn snapshot(&self) -> Vec<QueuedOperation> {
        self.entries.lock().clone()
    }

    /// Empties the queue unconditionally.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let discarded = entries.len();
        entries.clear();
        if let Err(e) = self.persist(&entries) {
            tracing::error!(error = %e, "failed to persist cleared offline queue");
        }
        tracing::info!(discarded, "cleared offline queue");
    }

    /// Merges the outcome of a processing pass into the current queue.
    ///
    /// Entries are matched by id, which is unique within the queue. Applied and dropped entries are removed,
    /// retried entries get their new retry count, and entries that were not
    /// part of the pass (enqueued while it ran) are left untouched. Entries
    /// that disappeared during the pass, e.g. through [`QueueStore::clear`],
    /// are not brought back.
    pub fn commit_pass(&self, outcomes: &[(String, EntryOutcome)]) {
        let by_id: HashMap<&str, &EntryOutcome> = outcomes
            .iter()
            .map(|(id, outcome)| (id.as_str(), outcome))
            .collect();

        let mut entries = self.entries.lock();
        entries.retain_mut(|entry| match by_id.get(entry.id.as_str()) {
            None => true,
            Some(EntryOutcome::Applied | EntryOutcome::Dropped) => false,
            Some(EntryOutcome::Retry { retry_count }) => {
                entry.retry_count = *retry_count;
                true
            }
        });

        if let Err(e) = self.persist(&entries) {
            tracing::error!(error = %e, "failed to persist offline queue after pass");
        }
    }

    fn persist(&self, entries: &[QueuedOperation]) -> SyncResult<()> {
        let document = encode_queue(entries)?;
        self.backend.set(&self.config.storage_key, &document)?;
        Ok(())
    }
}

fn load<S: KeyValueStore>(backend: &S, key: &str) -> Vec<QueuedOperation> {
    let document = match backend.get(key) {
        Ok(Some(document)) => document,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to read offline queue, starting empty");
            return Vec::new();
        }
    };

    match decode_queue(&document) {
        Ok(entries) => entries,
        Err(e) => {
            let aside = format!("{key}{UNREADABLE_SUFFIX}");
            tracing::warn!(
                key,
                aside = %aside,
                error = %e,
                "failed to decode offline queue, starting empty"
            );
            if let Err(e) = backend.set(&aside, &document) {
                tracing::error!(key = %aside, error = %e, "failed to keep unreadable offline queue");
            }
            Vec::new()
        }
    }
}

/// Gives every entry whose id already appears earlier in the list a fresh id.
/// Returns the number of renewed entries.
fn renew_duplicate_ids(entries: &mut [QueuedOperation]) -> usize {
    let mut renewed = 0;
    for index in 0..entries.len() {
        if !entries[..index].iter().any(|e| e.id == entries[index].id) {
            continue;
        }
        let duplicate = entries[index].id.clone();
        loop {
            entries[index].renew_id();
            let id = &entries[index].id;
            if !entries.iter().enumerate().any(|(i, e)| i != index && &e.id == id) {
                break;
            }
        }
        tracing::warn!(
            duplicate = %duplicate,
            op_id = %entries[index].id,
            "renewed duplicate offline queue id"
        );
        renewed += 1;
    }
    renewed
}

//! Local ledger standing in for the remote transaction store.
//!
//! Records live in the data directory under a single `ledger` key as a JSON
//! object keyed by transaction id.

use std::collections::BTreeMap;
use std::sync::Arc;
use tally_core::{TransactionId, TransactionRecord};
use tally_storage::{FileStore, KeyValueStore, StorageError};
use tally_sync::{RemoteOperations, SyncError, SyncResult};
use thiserror::Error;

/// Storage key of the ledger document.
pub const LEDGER_KEY: &str = "ledger";

/// Errors raised by the local ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Reading or writing the ledger failed.
    #[error("ledger storage error: {0}")]
    Storage(#[from] StorageError),

    /// The ledger document is malformed.
    #[error("ledger document error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Update of a record the ledger does not hold.
    #[error("no transaction with id {0}")]
    UnknownTransaction(TransactionId),
}

impl From<LedgerError> for SyncError {
    fn from(e: LedgerError) -> Self {
        SyncError::remote(e.to_string())
    }
}

type Records = BTreeMap<TransactionId, TransactionRecord>;

/// Transaction table persisted in a [`FileStore`].
pub struct LocalLedger {
    store: Arc<FileStore>,
}

impl LocalLedger {
    /// Wraps the store.
    pub fn new(store: Arc<FileStore>) -> Self {
        Self { store }
    }

    /// Returns every record, ordered by id.
    pub fn records(&self) -> Result<Vec<TransactionRecord>, LedgerError> {
        Ok(self.load()?.into_values().collect())
    }

    fn load(&self) -> Result<Records, LedgerError> {
        match self.store.get(LEDGER_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Records::new()),
        }
    }

    fn save_all(&self, records: &Records) -> Result<(), LedgerError> {
        self.store.set(LEDGER_KEY, &serde_json::to_string(records)?)?;
        Ok(())
    }

    fn upsert(&self, record: &TransactionRecord, must_exist: bool) -> Result<(), LedgerError> {
        let mut records = self.load()?;
        if must_exist && !records.contains_key(&record.id) {
            return Err(LedgerError::UnknownTransaction(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        self.save_all(&records)
    }

    fn remove(&self, id: &TransactionId) -> Result<(), LedgerError> {
        let mut records = self.load()?;
        if records.remove(id).is_some() {
            self.save_all(&records)?;
        }
        Ok(())
    }
}

impl RemoteOperations for LocalLedger {
    async fn save(&self, record: &TransactionRecord) -> SyncResult<()> {
        // Saving twice is allowed so an interrupted replay can be re-run.
        Ok(self.upsert(record, false)?)
    }

    async fn update(&self, record: &TransactionRecord) -> SyncResult<()> {
        Ok(self.upsert(record, true)?)
    }

    async fn delete(&self, id: &TransactionId) -> SyncResult<()> {
        Ok(self.remove(id)?)
    }
}

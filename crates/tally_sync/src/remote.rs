//! Remote operation abstraction.
//!
//! The processor never talks to a backend directly. Callers inject the three
//! remote functions through [`RemoteOperations`], either by implementing the
//! trait or by wrapping async closures in [`RemoteFns`].

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use tally_core::{OperationKind, TransactionId, TransactionRecord};

/// The remote side of replay: save, update and delete a record.
///
/// Timeouts, authentication and transport are the implementor's concern;
/// the processor awaits each call to completion.
pub trait RemoteOperations: Send + Sync {
    /// Creates `record` remotely.
    fn save(&self, record: &TransactionRecord) -> impl Future<Output = SyncResult<()>> + Send;

    /// Replaces `record` remotely.
    fn update(&self, record: &TransactionRecord) -> impl Future<Output = SyncResult<()>> + Send;

    /// Deletes the record with `id` remotely.
    fn delete(&self, id: &TransactionId) -> impl Future<Output = SyncResult<()>> + Send;
}

/// Adapts three async closures into [`RemoteOperations`].
///
/// # Example
///
/// ```rust
/// use tally_sync::{RemoteFns, SyncError};
///
/// let remote = RemoteFns::new(
///     |record| async move { println!("save {}", record.id); Ok(()) },
///     |record| async move { println!("update {}", record.id); Ok(()) },
///     |id| async move { Err(SyncError::remote(format!("cannot delete {id}"))) },
/// );
/// # let _ = remote;
/// ```
pub struct RemoteFns<S, U, D> {
    save: S,
    update: U,
    delete: D,
}

impl<S, U, D> RemoteFns<S, U, D> {
    /// Wraps the save, update and delete functions.
    pub fn new<SF, UF, DF>(save: S, update: U, delete: D) -> Self
    where
        S: Fn(TransactionRecord) -> SF,
        SF: Future<Output = SyncResult<()>>,
        U: Fn(TransactionRecord) -> UF,
        UF: Future<Output = SyncResult<()>>,
        D: Fn(TransactionId) -> DF,
        DF: Future<Output = SyncResult<()>>,
    {
        Self {
            save,
            update,
            delete,
        }
    }
}

impl<S, SF, U, UF, D, DF> RemoteOperations for RemoteFns<S, U, D>
where
    S: Fn(TransactionRecord) -> SF + Send + Sync,
    SF: Future<Output = SyncResult<()>> + Send,
    U: Fn(TransactionRecord) -> UF + Send + Sync,
    UF: Future<Output = SyncResult<()>> + Send,
    D: Fn(TransactionId) -> DF + Send + Sync,
    DF: Future<Output = SyncResult<()>> + Send,
{
    fn save(&self, record: &TransactionRecord) -> impl Future<Output = SyncResult<()>> + Send {
        (self.save)(record.clone())
    }

    fn update(&self, record: &TransactionRecord) -> impl Future<Output = SyncResult<()>> + Send {
        (self.update)(record.clone())
    }

    fn delete(&self, id: &TransactionId) -> impl Future<Output = SyncResult<()>> + Send {
        (self.delete)(id.clone())
    }
}

/// One call observed by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Which function was called.
    pub kind: OperationKind,
    /// Record the call targeted.
    pub transaction_id: TransactionId,
}

#[derive(Debug, Default)]
struct MockState {
    records: BTreeMap<TransactionId, TransactionRecord>,
    calls: Vec<RemoteCall>,
    failing_kinds: HashSet<OperationKind>,
    failing_ids: HashSet<TransactionId>,
    fail_next: u32,
}

/// An in-memory remote for testing.
///
/// Keeps a table of records, logs every call, and can be scripted to fail.
#[derive(Debug, Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    /// Creates a mock that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call of `kind` fail.
    pub fn fail_kind(&self, kind: OperationKind) {
        self.state.lock().failing_kinds.insert(kind);
    }

    /// Makes every call targeting `id` fail.
    pub fn fail_transaction(&self, id: impl Into<TransactionId>) {
        self.state.lock().failing_ids.insert(id.into());
    }

    /// Makes the next `count` calls fail regardless of target.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Removes all scripted failures.
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.failing_kinds.clear();
        state.failing_ids.clear();
        state.fail_next = 0;
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the records currently held remotely.
    pub fn records(&self) -> Vec<TransactionRecord> {
        self.state.lock().records.values().cloned().collect()
    }

    /// Returns the record with `id`, if held.
    pub fn record(&self, id: &str) -> Option<TransactionRecord> {
        self.state.lock().records.get(&TransactionId::new(id)).cloned()
    }

    fn apply(
        &self,
        kind: OperationKind,
        id: &TransactionId,
        record: Option<&TransactionRecord>,
    ) -> SyncResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RemoteCall {
            kind,
            transaction_id: id.clone(),
        });

        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(SyncError::remote("scripted failure"));
        }
        if state.failing_kinds.contains(&kind) || state.failing_ids.contains(id) {
            return Err(SyncError::remote(format!("{kind} rejected for {id}")));
        }

        match record {
            Some(record) => {
                state.records.insert(id.clone(), record.clone());
            }
            None => {
                state.records.remove(id);
            }
        }
        Ok(())
    }
}

impl RemoteOperations for MockRemote {
    async fn save(&self, record: &TransactionRecord) -> SyncResult<()> {
        self.apply(OperationKind::Save, &record.id, Some(record))
    }

    async fn update(&self, record: &TransactionRecord) -> SyncResult<()> {
        self.apply(OperationKind::Update, &record.id, Some(record))
    }

    async fn delete(&self, id: &TransactionId) -> SyncResult<()> {
        self.apply(OperationKind::Delete, id, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn mock_remote_applies_and_logs() {
        let remote = MockRemote::new();
        remote.save(&TransactionRecord::new("t1", "Coffee", 5.0)).await.unwrap();
        remote.update(&TransactionRecord::new("t1", "Coffee", 6.0)).await.unwrap();

        assert_eq!(remote.record("t1").unwrap().total, 6.0);

        remote.delete(&"t1".into()).await.unwrap();
        assert!(remote.records().is_empty());

        let kinds: Vec<OperationKind> = remote.calls().into_iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Save, OperationKind::Update, OperationKind::Delete]
        );
    }

    #[tokio::test]
    async fn mock_remote_scripted_failures() {
        let remote = MockRemote::new();
        remote.fail_kind(OperationKind::Delete);
        remote.fail_transaction("bad");
        remote.fail_next(1);

        let coffee = TransactionRecord::new("t1", "Coffee", 5.0);
        assert!(remote.save(&coffee).await.is_err());
        assert!(remote.save(&coffee).await.is_ok());
        assert!(remote.delete(&"t1".into()).await.is_err());
        assert!(remote.save(&TransactionRecord::new("bad", "x", 1.0)).await.is_err());

        remote.heal();
        assert!(remote.delete(&"t1".into()).await.is_ok());
        assert_eq!(remote.calls().len(), 5);
    }

    #[tokio::test]
    async fn remote_fns_forward_owned_values() {
        let deletes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&deletes);

        let remote = RemoteFns::new(
            |record: TransactionRecord| async move {
                assert_eq!(record.item, "Coffee");
                Ok(())
            },
            |_record: TransactionRecord| async { Err(SyncError::NotConnected) },
            move |id: TransactionId| {
                let counter = Arc::clone(&counter);
                async move {
                    assert_eq!(id.as_str(), "t2");
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        );

        let coffee = TransactionRecord::new("t1", "Coffee", 5.0);
        assert!(remote.save(&coffee).await.is_ok());
        assert!(matches!(
            remote.update(&coffee).await,
            Err(SyncError::NotConnected)
        ));
        remote.delete(&"t2".into()).await.unwrap();
        assert_eq!(deletes.load(Ordering::SeqCst), 1);
    }
}

//! Pending local mutations.

use crate::transaction::{TransactionId, TransactionRecord};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of the random suffix in generated operation ids.
const ID_SUFFIX_LEN: usize = 9;

/// Discriminant of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Create a record remotely.
    Save,
    /// Replace a record remotely.
    Update,
    /// Delete a record remotely.
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => f.write_str("save"),
            Self::Update => f.write_str("update"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// A local mutation to be applied to the remote store.
///
/// The variant decides which payload is present: a full record for
/// `Save`/`Update`, an identifier for `Delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "lowercase")]
pub enum Operation {
    /// Create the record.
    Save(TransactionRecord),
    /// Replace the record.
    Update(TransactionRecord),
    /// Delete the record with this id.
    Delete(TransactionId),
}

impl Operation {
    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Save(_) => OperationKind::Save,
            Self::Update(_) => OperationKind::Update,
            Self::Delete(_) => OperationKind::Delete,
        }
    }

    /// Returns the id of the record this operation touches.
    #[must_use]
    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            Self::Save(record) | Self::Update(record) => &record.id,
            Self::Delete(id) => id,
        }
    }
}

/// An operation waiting in the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedOperation {
    /// Queue entry id (`<unix-millis>-<suffix>`).
    pub id: String,
    /// The mutation to replay.
    #[serde(flatten)]
    pub operation: Operation,
    /// Unix milliseconds at enqueue time. Not used for ordering.
    pub enqueued_at: u64,
    /// Failed replay attempts so far.
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedOperation {
    /// Wraps `operation` in a fresh entry with a generated id.
    pub fn new(operation: Operation) -> Self {
        let enqueued_at = now_millis();
        Self {
            id: generate_id(enqueued_at),
            operation,
            enqueued_at,
            retry_count: 0,
        }
    }

    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    /// Replaces the id with a newly generated one. Other fields are kept.
    pub fn renew_id(&mut self) {
        self.id = generate_id(now_millis());
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Time-based id with a random suffix. Unique in practice, not guaranteed.
fn generate_id(millis: u64) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    format!("{millis}-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn kind_matches_payload() {
        let save = Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0));
        let delete = Operation::Delete("t2".into());

        assert_eq!(save.kind(), OperationKind::Save);
        assert_eq!(save.transaction_id().as_str(), "t1");
        assert_eq!(delete.kind(), OperationKind::Delete);
        assert_eq!(delete.transaction_id().as_str(), "t2");
    }

    #[test]
    fn queued_operation_starts_fresh() {
        let entry = QueuedOperation::new(Operation::Delete("t2".into()));
        assert_eq!(entry.retry_count, 0);
        assert!(entry.enqueued_at > 0);

        let (millis, suffix) = entry.id.split_once('-').unwrap();
        assert_eq!(millis.parse::<u64>().unwrap(), entry.enqueued_at);
        assert_eq!(suffix.len(), ID_SUFFIX_LEN);
    }

    #[test]
    fn renew_id_keeps_payload() {
        let mut entry = QueuedOperation {
            id: "1-dup".into(),
            operation: Operation::Delete("t2".into()),
            enqueued_at: 1,
            retry_count: 3,
        };
        entry.renew_id();

        assert_ne!(entry.id, "1-dup");
        assert_eq!(entry.operation, Operation::Delete("t2".into()));
        assert_eq!(entry.enqueued_at, 1);
        assert_eq!(entry.retry_count, 3);
    }

    #[test]
    fn generated_ids_are_distinct() {
        let ids: HashSet<String> = (0..500).map(|_| generate_id(42)).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn json_shape() {
        let entry = QueuedOperation {
            id: "1-abc".into(),
            operation: Operation::Delete("t2".into()),
            enqueued_at: 1,
            retry_count: 3,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "delete");
        assert_eq!(value["payload"], "t2");
        assert_eq!(value["enqueuedAt"], 1);
        assert_eq!(value["retryCount"], 3);
    }

    #[test]
    fn json_save_payload_is_record() {
        let json = r#"{"id":"1-a","kind":"save","payload":{"id":"t1","item":"Coffee","total":5},"enqueuedAt":7}"#;
        let entry: QueuedOperation = serde_json::from_str(json).unwrap();

        assert_eq!(entry.retry_count, 0);
        assert_eq!(
            entry.operation,
            Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0))
        );
    }

    #[test]
    fn json_mismatched_payload_rejected() {
        let json = r#"{"id":"1-a","kind":"delete","payload":{"id":"t1","item":"x","total":1},"enqueuedAt":7}"#;
        assert!(serde_json::from_str::<QueuedOperation>(json).is_err());
    }
}

//! Queue document codec.
//!
//! The queue is stored under a single key as one JSON document:
//!
//! ```text
//! {"version":1,"operations":[{"id":..,"kind":..,"payload":..,"enqueuedAt":..,"retryCount":..}]}
//! ```
//!
//! A bare JSON array of operations (the unversioned layout) is still read.

use crate::error::{CoreError, CoreResult};
use crate::operation::QueuedOperation;
use serde::{Deserialize, Serialize};

/// Format version written by [`encode_queue`].
pub const QUEUE_FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    operations: &'a [QueuedOperation],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredQueue {
    Envelope {
        version: u32,
        #[serde(default)]
        operations: Vec<QueuedOperation>,
    },
    Legacy(Vec<QueuedOperation>),
}

/// Encodes the queue as a versioned JSON document.
pub fn encode_queue(operations: &[QueuedOperation]) -> CoreResult<String> {
    Ok(serde_json::to_string(&EnvelopeRef {
        version: QUEUE_FORMAT_VERSION,
        operations,
    })?)
}

/// Decodes a queue document, accepting both layouts.
pub fn decode_queue(json: &str) -> CoreResult<Vec<QueuedOperation>> {
    match serde_json::from_str::<StoredQueue>(json)? {
        StoredQueue::Envelope {
            version,
            operations,
        } => {
            if version > QUEUE_FORMAT_VERSION || version == 0 {
                return Err(CoreError::UnsupportedVersion {
                    found: version,
                    supported: QUEUE_FORMAT_VERSION,
                });
            }
            Ok(operations)
        }
        StoredQueue::Legacy(operations) => Ok(operations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use crate::transaction::TransactionRecord;

    fn sample() -> Vec<QueuedOperation> {
        vec![
            QueuedOperation::new(Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0))),
            QueuedOperation::new(Operation::Update(TransactionRecord::new("t1", "Coffee", 6.0))),
            QueuedOperation::new(Operation::Delete("t1".into())),
        ]
    }

    #[test]
    fn encode_writes_envelope() {
        let json = encode_queue(&sample()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], QUEUE_FORMAT_VERSION);
        assert_eq!(value["operations"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn decode_preserves_order() {
        let ops = sample();
        let decoded = decode_queue(&encode_queue(&ops).unwrap()).unwrap();
        assert_eq!(decoded, ops);
    }

    #[test]
    fn decode_legacy_array() {
        let json = r#"[{"id":"1-a","kind":"delete","payload":"t2","enqueuedAt":1,"retryCount":2}]"#;
        let decoded = decode_queue(json).unwrap();

        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].retry_count, 2);
        assert_eq!(decoded[0].operation, Operation::Delete("t2".into()));
    }

    #[test]
    fn decode_empty_forms() {
        assert!(decode_queue("[]").unwrap().is_empty());
        assert!(decode_queue(r#"{"version":1}"#).unwrap().is_empty());
    }

    #[test]
    fn decode_future_version_rejected() {
        let err = decode_queue(r#"{"version":9,"operations":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnsupportedVersion { found: 9, supported: 1 }
        ));
    }

    #[test]
    fn decode_garbage_is_codec_error() {
        assert!(matches!(decode_queue("not json"), Err(CoreError::Codec(_))));
        assert!(matches!(decode_queue(r#"{"foo":1}"#), Err(CoreError::Codec(_))));
        assert!(matches!(decode_queue(r#"[{"id":1}]"#), Err(CoreError::Codec(_))));
    }
}

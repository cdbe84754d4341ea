//! Enqueue command implementation.

use super::{open_queue, open_store};
use crate::RecordArgs;
use std::path::Path;
use tally_core::{Operation, TransactionKind, TransactionRecord};

impl RecordArgs {
    /// Builds the record described by the arguments.
    pub fn into_record(self) -> Result<TransactionRecord, String> {
        let kind = TransactionKind::parse(&self.kind)
            .ok_or_else(|| format!("unknown kind {:?} (expected sale or expense)", self.kind))?;
        if !self.total.is_finite() {
            return Err(format!("total must be a finite number, got {}", self.total));
        }

        let mut record = TransactionRecord::new(self.id, self.item, self.total)
            .with_kind(kind)
            .with_quantity(self.quantity);
        record.category = self.category;
        record.date = self.date;
        record.note = self.note;
        Ok(record)
    }
}

/// Runs the enqueue command.
pub fn run(path: &Path, operation: Operation) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let queue = open_queue(&store);

    let kind = operation.kind();
    let transaction = operation.transaction_id().clone();
    let id = queue.try_enqueue(operation)?;

    println!("Queued {kind} of {transaction} as {id} ({} pending)", queue.count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(kind: &str, total: f64) -> RecordArgs {
        RecordArgs {
            id: "t1".into(),
            item: "Coffee".into(),
            total,
            kind: kind.into(),
            quantity: 1.0,
            category: Some("drinks".into()),
            date: None,
            note: None,
        }
    }

    #[test]
    fn record_from_args() {
        let record = args("Expense", 4.5).into_record().unwrap();
        assert_eq!(record.kind, TransactionKind::Expense);
        assert_eq!(record.category.as_deref(), Some("drinks"));
        assert_eq!(record.total, 4.5);
    }

    #[test]
    fn bad_kind_rejected() {
        assert!(args("refund", 1.0).into_record().is_err());
        assert!(args("sale", f64::NAN).into_record().is_err());
    }

    #[test]
    fn enqueue_persists_to_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), Operation::Delete("t1".into())).unwrap();
        run(dir.path(), Operation::Delete("t2".into())).unwrap();

        let store = open_store(dir.path()).unwrap();
        assert_eq!(open_queue(&store).count(), 2);
    }
}

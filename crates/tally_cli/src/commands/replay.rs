//! Replay command implementation.

use super::{open_queue, open_store};
use crate::ledger::LocalLedger;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tally_sync::{
    ManualMonitor, PassStatus, ProcessHooks, ProcessReport, ProcessorConfig, QueueProcessor,
};

/// Replay outcome.
#[derive(Debug, Serialize)]
pub struct ReplayResult {
    /// `completed`, `offline` or `already-running`.
    pub status: &'static str,
    /// Operations applied to the ledger.
    pub successful: usize,
    /// Operations dropped after exhausting retries.
    pub failed: usize,
    /// Operations still queued.
    pub remaining: usize,
    /// Dropped operations with their last error.
    pub dropped: Vec<DroppedEntry>,
}

/// A dropped operation.
#[derive(Debug, Serialize)]
pub struct DroppedEntry {
    /// Queue entry id.
    pub id: String,
    /// Operation kind.
    pub kind: String,
    /// Target transaction.
    pub transaction: String,
    /// Last error.
    pub error: String,
}

impl From<&ProcessReport> for ReplayResult {
    fn from(report: &ProcessReport) -> Self {
        Self {
            status: match report.status {
                PassStatus::Completed => "completed",
                PassStatus::Offline => "offline",
                PassStatus::AlreadyRunning => "already-running",
            },
            successful: report.successful,
            failed: report.failed,
            remaining: report.remaining,
            dropped: report
                .dropped
                .iter()
                .map(|d| DroppedEntry {
                    id: d.entry.id.clone(),
                    kind: d.entry.kind().to_string(),
                    transaction: d.entry.operation.transaction_id().to_string(),
                    error: d.error.clone(),
                })
                .collect(),
        }
    }
}

/// Runs the replay command.
pub fn run(
    path: &Path,
    online: bool,
    show_progress: bool,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = replay(path, online, show_progress)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Drains the queue into the ledger kept in the same directory.
pub fn replay(
    path: &Path,
    online: bool,
    show_progress: bool,
) -> Result<ReplayResult, Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let processor = QueueProcessor::new(
        Arc::new(open_queue(&store)),
        Arc::new(ManualMonitor::new(online)),
        ProcessorConfig::default(),
    );
    let ledger = LocalLedger::new(Arc::clone(&store));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let mut hooks = ProcessHooks::new();
    if show_progress {
        hooks = hooks.on_progress(|p| {
            eprintln!("[{}/{}] ok={} dropped={}", p.processed, p.total, p.successful, p.failed);
        });
    }
    let report = runtime.block_on(processor.process_with(&ledger, hooks));

    Ok(ReplayResult::from(&report))
}

fn print_text_output(result: &ReplayResult) {
    match result.status {
        "offline" => println!("Offline: {} operation(s) left queued", result.remaining),
        _ => {
            println!("Replayed:  {}", result.successful);
            println!("Dropped:   {}", result.failed);
            println!("Remaining: {}", result.remaining);
        }
    }

    if !result.dropped.is_empty() {
        println!();
        println!("Sync failed for:");
        for entry in &result.dropped {
            println!(
                "  {} {} {}: {}",
                entry.id, entry.kind, entry.transaction, entry.error
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LocalLedger;
    use tally_core::{Operation, TransactionRecord};

    fn enqueue(path: &Path, operation: Operation) {
        let store = open_store(path).unwrap();
        open_queue(&store).enqueue(operation);
    }

    #[test]
    fn offline_replay_leaves_queue() {
        let dir = tempfile::tempdir().unwrap();
        enqueue(dir.path(), Operation::Delete("t1".into()));

        let result = replay(dir.path(), false, false).unwrap();
        assert_eq!(result.status, "offline");
        assert_eq!(result.remaining, 1);
    }

    #[test]
    fn replay_applies_to_ledger() {
        let dir = tempfile::tempdir().unwrap();
        enqueue(
            dir.path(),
            Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0)),
        );
        enqueue(
            dir.path(),
            Operation::Update(TransactionRecord::new("ghost", "Tea", 2.0)),
        );

        let result = replay(dir.path(), true, false).unwrap();
        assert_eq!(result.status, "completed");
        assert_eq!(result.successful, 1);
        assert_eq!(result.remaining, 1);

        let store = open_store(dir.path()).unwrap();
        let records = LocalLedger::new(store).records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item, "Coffee");
    }
}

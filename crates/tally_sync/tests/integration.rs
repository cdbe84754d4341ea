//! End-to-end behavior of the offline queue over real storage backends.

use proptest::prelude::*;
use std::sync::Arc;
use tally_core::{Operation, OperationKind, TransactionRecord};
use tally_storage::{FileStore, InMemoryStore, KeyValueStore};
use tally_sync::{
    ManualMonitor, MockRemote, PassStatus, ProcessorConfig, QueueProcessor, QueueStore,
};

fn processor_over<S: KeyValueStore>(
    backend: S,
    monitor: Arc<ManualMonitor>,
) -> QueueProcessor<S, ManualMonitor> {
    QueueProcessor::new(
        Arc::new(QueueStore::with_defaults(backend)),
        monitor,
        ProcessorConfig::default(),
    )
}

#[tokio::test]
async fn coffee_sale_offline_then_online() {
    let monitor = Arc::new(ManualMonitor::offline());
    let processor = processor_over(InMemoryStore::new(), Arc::clone(&monitor));
    let remote = MockRemote::new();

    processor
        .queue()
        .enqueue(Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0)));

    let report = processor.process(&remote).await;
    assert_eq!(report.status, PassStatus::Offline);
    assert!(remote.calls().is_empty());
    assert_eq!(processor.queue().count(), 1);

    monitor.set_online(true);
    let report = processor.process(&remote).await;
    assert_eq!(processor.queue().count(), 0);
    assert_eq!(report.successful, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn rejected_delete_dropped_after_five_passes() {
    let monitor = Arc::new(ManualMonitor::online());
    let processor = processor_over(InMemoryStore::new(), monitor);
    let remote = MockRemote::new();
    remote.fail_kind(OperationKind::Delete);

    processor.queue().enqueue(Operation::Delete("t2".into()));

    let mut failed = 0;
    for _ in 0..5 {
        failed += processor.process(&remote).await.failed;
    }

    assert_eq!(processor.queue().count(), 0);
    assert_eq!(failed, 1);
    assert_eq!(remote.calls().len(), 5);
}

#[tokio::test]
async fn queue_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ops = vec![
        Operation::Save(TransactionRecord::new("a", "Bread", 2.5)),
        Operation::Update(TransactionRecord::new("a", "Bread", 3.0)),
        Operation::Delete("a".into()),
        Operation::Save(TransactionRecord::new("b", "Milk", 1.2)),
    ];

    let ids: Vec<String> = {
        let store = FileStore::open(dir.path()).unwrap();
        let queue = QueueStore::with_defaults(store);
        ops.iter().cloned().map(|op| queue.enqueue(op)).collect()
    };

    let store = FileStore::open(dir.path()).unwrap();
    let monitor = Arc::new(ManualMonitor::online());
    let processor = processor_over(store, monitor);

    let restored = processor.queue().snapshot();
    assert_eq!(restored.len(), ops.len());
    assert_eq!(restored.iter().map(|e| e.id.clone()).collect::<Vec<_>>(), ids);

    let remote = MockRemote::new();
    let report = processor.process(&remote).await;
    assert_eq!(report.successful, 4);

    let replayed: Vec<(OperationKind, String)> = remote
        .calls()
        .into_iter()
        .map(|c| (c.kind, c.transaction_id.to_string()))
        .collect();
    assert_eq!(
        replayed,
        vec![
            (OperationKind::Save, "a".to_string()),
            (OperationKind::Update, "a".to_string()),
            (OperationKind::Delete, "a".to_string()),
            (OperationKind::Save, "b".to_string()),
        ]
    );
    assert_eq!(remote.records().len(), 1);
}

#[tokio::test]
async fn retry_counts_persist_between_runs() {
    let backend = Arc::new(InMemoryStore::new());
    let remote = MockRemote::new();
    remote.fail_transaction("t2");

    {
        let processor = processor_over(Arc::clone(&backend), Arc::new(ManualMonitor::online()));
        processor.queue().enqueue(Operation::Delete("t2".into()));
        for _ in 0..3 {
            processor.process(&remote).await;
        }
    }

    let processor = processor_over(backend, Arc::new(ManualMonitor::online()));
    assert_eq!(processor.queue().snapshot()[0].retry_count, 3);

    processor.process(&remote).await;
    let report = processor.process(&remote).await;
    assert_eq!(report.failed, 1);
    assert_eq!(processor.queue().count(), 0);
}

#[derive(Debug, Clone)]
enum Step {
    Enqueue(bool),
    Pass,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => any::<bool>().prop_map(Step::Enqueue),
        1 => Just(Step::Pass),
    ]
}

proptest! {
    #[test]
    fn count_tracks_enqueues_minus_resolved(steps in proptest::collection::vec(step(), 0..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let processor = processor_over(InMemoryStore::new(), Arc::new(ManualMonitor::online()));
            let remote = MockRemote::new();
            remote.fail_transaction("doomed");

            let mut enqueued = 0usize;
            let mut resolved = 0usize;
            for step in &steps {
                match step {
                    Step::Enqueue(ok) => {
                        let id = if *ok { format!("t{enqueued}") } else { "doomed".to_string() };
                        processor.queue().enqueue(Operation::Delete(id.into()));
                        enqueued += 1;
                    }
                    Step::Pass => {
                        let report = processor.process(&remote).await;
                        resolved += report.successful + report.failed;
                    }
                }
                assert_eq!(processor.queue().count(), enqueued - resolved);
            }
        });
    }
}

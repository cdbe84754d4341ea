//! Retry-on-reconnect wiring.

use crate::network::{ConnectivityListener, NetworkMonitor, Subscription};
use crate::processor::{ProcessReport, QueueProcessor};
use crate::remote::RemoteOperations;
use std::sync::Arc;
use tally_storage::KeyValueStore;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Runs a processing pass every time the network comes back.
///
/// The agent subscribes to the processor's monitor, and a background task
/// drains the queue on each `online` transition or explicit
/// [`SyncAgent::trigger`]. Triggers that arrive while a pass runs coalesce
/// into one follow-up pass. Must be spawned inside a tokio runtime.
pub struct SyncAgent {
    wake: Arc<Notify>,
    reports: watch::Receiver<Option<ProcessReport>>,
    subscription: Option<Subscription>,
    task: Option<JoinHandle<()>>,
}

impl SyncAgent {
    /// Starts the agent. Runs an initial pass if already online.
    pub fn spawn<S, N, R>(processor: Arc<QueueProcessor<S, N>>, remote: Arc<R>) -> Self
    where
        S: KeyValueStore + 'static,
        N: NetworkMonitor + 'static,
        R: RemoteOperations + 'static,
    {
        let wake = Arc::new(Notify::new());
        let (report_tx, reports) = watch::channel(None);

        let on_online = Arc::clone(&wake);
        let subscription = processor
            .network()
            .subscribe(ConnectivityListener::on_online(move || on_online.notify_one()));

        if processor.network().is_online() {
            wake.notify_one();
        }

        let notified = Arc::clone(&wake);
        let task = tokio::spawn(async move {
            loop {
                notified.notified().await;
                let report = processor.process(remote.as_ref()).await;
                tracing::debug!(status = ?report.status, "sync agent pass finished");
                if report_tx.send(Some(report)).is_err() {
                    break;
                }
            }
        });

        Self {
            wake,
            reports,
            subscription: Some(subscription),
            task: Some(task),
        }
    }

    /// Requests a pass now.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Returns a receiver for the report of each pass.
    pub fn reports(&self) -> watch::Receiver<Option<ProcessReport>> {
        self.reports.clone()
    }

    /// Unsubscribes from the monitor and stops the background task.
    ///
    /// A pass in progress is abandoned; its entries stay queued.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SyncAgent {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessorConfig;
    use crate::network::ManualMonitor;
    use crate::processor::PassStatus;
    use crate::queue::QueueStore;
    use crate::remote::{MockRemote, RemoteFns};
    use std::time::Duration;
    use tally_core::{Operation, TransactionRecord};
    use tally_storage::InMemoryStore;

    async fn next_report(
        reports: &mut watch::Receiver<Option<ProcessReport>>,
    ) -> ProcessReport {
        tokio::time::timeout(Duration::from_secs(2), reports.changed())
            .await
            .expect("no report in time")
            .unwrap();
        reports.borrow_and_update().clone().unwrap()
    }

    #[tokio::test]
    async fn drains_when_network_returns() {
        let monitor = Arc::new(ManualMonitor::offline());
        let processor = Arc::new(QueueProcessor::new(
            Arc::new(QueueStore::with_defaults(InMemoryStore::new())),
            Arc::clone(&monitor),
            ProcessorConfig::default(),
        ));
        processor
            .queue()
            .enqueue(Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0)));
        let remote = Arc::new(MockRemote::new());

        let agent = SyncAgent::spawn(Arc::clone(&processor), Arc::clone(&remote));
        let mut reports = agent.reports();

        monitor.set_online(true);
        let report = next_report(&mut reports).await;
        assert_eq!(report.status, PassStatus::Completed);
        assert_eq!(report.successful, 1);
        assert_eq!(processor.queue().count(), 0);
        assert!(remote.record("t1").is_some());

        agent.stop();
        assert_eq!(monitor.listener_count(), 0);
    }

    #[tokio::test]
    async fn explicit_trigger_runs_pass() {
        let monitor = Arc::new(ManualMonitor::online());
        let processor = Arc::new(QueueProcessor::new(
            Arc::new(QueueStore::with_defaults(InMemoryStore::new())),
            Arc::clone(&monitor),
            ProcessorConfig::default(),
        ));
        let remote = Arc::new(MockRemote::new());

        let agent = SyncAgent::spawn(Arc::clone(&processor), Arc::clone(&remote));
        let mut reports = agent.reports();

        // Initial pass because the monitor started online.
        let first = next_report(&mut reports).await;
        assert_eq!(first.successful, 0);

        processor.queue().enqueue(Operation::Delete("t9".into()));
        agent.trigger();
        let second = next_report(&mut reports).await;
        assert_eq!(second.successful, 1);
    }

    #[tokio::test]
    async fn triggers_during_a_pass_coalesce() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (entered_tx, release_rx) = (Arc::clone(&entered), Arc::clone(&release));
        let remote = Arc::new(RemoteFns::new(
            move |_| {
                let (entered, release) = (Arc::clone(&entered_tx), Arc::clone(&release_rx));
                async move {
                    entered.notify_one();
                    release.notified().await;
                    Ok(())
                }
            },
            |_| async { Ok(()) },
            |_| async { Ok(()) },
        ));

        let processor = Arc::new(QueueProcessor::new(
            Arc::new(QueueStore::with_defaults(InMemoryStore::new())),
            Arc::new(ManualMonitor::online()),
            ProcessorConfig::default(),
        ));
        processor
            .queue()
            .enqueue(Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0)));

        let agent = SyncAgent::spawn(Arc::clone(&processor), remote);
        tokio::time::timeout(Duration::from_secs(2), entered.notified())
            .await
            .expect("initial pass did not start");

        for _ in 0..3 {
            agent.trigger();
        }
        release.notify_one();

        let passes_reach = |n: u64| {
            let processor = Arc::clone(&processor);
            async move {
                while processor.stats().passes_completed < n {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(2), passes_reach(2))
            .await
            .expect("follow-up pass did not run");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(processor.stats().passes_completed, 2);
        assert!(processor.queue().is_empty());
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let monitor = Arc::new(ManualMonitor::offline());
        let processor = Arc::new(QueueProcessor::new(
            Arc::new(QueueStore::with_defaults(InMemoryStore::new())),
            Arc::clone(&monitor),
            ProcessorConfig::default(),
        ));

        {
            let _agent = SyncAgent::spawn(processor, Arc::new(MockRemote::new()));
            assert_eq!(monitor.listener_count(), 1);
        }
        assert_eq!(monitor.listener_count(), 0);
    }
}

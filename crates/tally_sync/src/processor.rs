//! Queue processor: replays pending operations against the remote.

use crate::config::ProcessorConfig;
use crate::error::SyncResult;
use crate::network::NetworkMonitor;
use crate::queue::{EntryOutcome, QueueStore};
use crate::remote::RemoteOperations;
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tally_core::{Operation, QueuedOperation};
use tally_storage::KeyValueStore;

/// How a call to [`QueueProcessor::process`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// The snapshot was drained.
    Completed,
    /// Offline; nothing was attempted.
    Offline,
    /// Another pass was in progress; nothing was attempted.
    AlreadyRunning,
}

/// An operation abandoned after exhausting its retries.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedOperation {
    /// The entry as it was when dropped, with its final retry count.
    pub entry: QueuedOperation,
    /// Error from the last attempt.
    pub error: String,
}

/// Result of one processing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessReport {
    /// How the pass ended.
    pub status: PassStatus,
    /// Operations applied remotely.
    pub successful: usize,
    /// Operations dropped after exhausting retries.
    pub failed: usize,
    /// Queue length after the pass.
    pub remaining: usize,
    /// Details of the dropped operations.
    pub dropped: Vec<DroppedOperation>,
    /// Wall time of the pass.
    pub duration: Duration,
}

impl ProcessReport {
    fn skipped(status: PassStatus, remaining: usize) -> Self {
        Self {
            status,
            successful: 0,
            failed: 0,
            remaining,
            dropped: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Progress after each entry of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Entries attempted so far.
    pub processed: usize,
    /// Entries in the pass snapshot.
    pub total: usize,
    /// Successes so far.
    pub successful: usize,
    /// Drops so far.
    pub failed: usize,
}

/// Optional callbacks for a pass.
///
/// Hooks only run for passes that actually start; offline and concurrent
/// calls are reported through the log and the returned report.
#[derive(Default)]
pub struct ProcessHooks<'a> {
    on_progress: Option<Box<dyn FnMut(Progress) + Send + 'a>>,
    on_complete: Option<Box<dyn FnOnce(&ProcessReport) + Send + 'a>>,
}

impl<'a> ProcessHooks<'a> {
    /// Creates empty hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after every entry.
    pub fn on_progress(mut self, f: impl FnMut(Progress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called once with the final report.
    pub fn on_complete(mut self, f: impl FnOnce(&ProcessReport) + Send + 'a) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for ProcessHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHooks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Statistics about processing passes.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to completion.
    pub passes_completed: u64,
    /// Operations applied remotely.
    pub operations_replayed: u64,
    /// Operations dropped after exhausting retries.
    pub operations_dropped: u64,
    /// Failed attempts that were kept for another pass.
    pub retries: u64,
    /// Drops not yet acknowledged by the caller.
    pub unacknowledged_drops: Vec<DroppedOperation>,
    /// When the last pass finished.
    pub last_pass_time: Option<Instant>,
    /// Last remote error message.
    pub last_error: Option<String>,
}

/// Sync indicator for the user interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncHealth {
    /// Nothing pending, nothing lost.
    Healthy,
    /// Operations are waiting to be replayed.
    Pending(usize),
    /// Operations were dropped and the user has not been told yet.
    Degraded {
        /// Number of unacknowledged drops.
        dropped: usize,
    },
}

/// Clears the running flag when a pass ends, including when its future is
/// dropped mid-pass.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drains a [`QueueStore`] against injected remote operations.
///
/// Entries are replayed strictly in queue order, one at a time, so a save
/// followed by a delete of the same record is applied in that order. A
/// failed entry never aborts the pass.
pub struct QueueProcessor<S: KeyValueStore, N: NetworkMonitor> {
    queue: Arc<QueueStore<S>>,
    network: Arc<N>,
    config: ProcessorConfig,
    stats: RwLock<SyncStats>,
    running: AtomicBool,
}

impl<S: KeyValueStore, N: NetworkMonitor> QueueProcessor<S, N> {
    /// Creates a processor.
    pub fn new(queue: Arc<QueueStore<S>>, network: Arc<N>, config: ProcessorConfig) -> Self {
        Self {
            queue,
            network,
            config,
            stats: RwLock::new(SyncStats::default()),
            running: AtomicBool::new(false),
        }
    }

    /// Returns the queue store.
    pub fn queue(&self) -> &Arc<QueueStore<S>> {
        &self.queue
    }

    /// Returns the network monitor.
    pub fn network(&self) -> &Arc<N> {
        &self.network
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Returns a copy of the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true while a pass is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the sync indicator.
    pub fn health(&self) -> SyncHealth {
        let dropped = self.stats.read().unacknowledged_drops.len();
        if dropped > 0 {
            return SyncHealth::Degraded { dropped };
        }
        match self.queue.count() {
            0 => SyncHealth::Healthy,
            n => SyncHealth::Pending(n),
        }
    }

    /// Returns and clears the unacknowledged drops.
    pub fn acknowledge_drops(&self) -> Vec<DroppedOperation> {
        std::mem::take(&mut self.stats.write().unacknowledged_drops)
    }

    /// Runs one pass without hooks.
    pub async fn process<R: RemoteOperations>(&self, remote: &R) -> ProcessReport {
        self.process_with(remote, ProcessHooks::default()).await
    }

    /// Runs one pass over a snapshot of the queue.
    ///
    /// Operations enqueued while the pass runs are not attempted and are
    /// kept for the next pass.
    pub async fn process_with<R: RemoteOperations>(
        &self,
        remote: &R,
        mut hooks: ProcessHooks<'_>,
    ) -> ProcessReport {
        if !self.network.is_online() {
            tracing::info!(pending = self.queue.count(), "offline, skipping queue processing");
            return ProcessReport::skipped(PassStatus::Offline, self.queue.count());
        }

        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            tracing::debug!("queue processing already in progress");
            return ProcessReport::skipped(PassStatus::AlreadyRunning, self.queue.count());
        };

        let start = Instant::now();
        let snapshot = self.queue.snapshot();
        let total = snapshot.len();
        let policy = &self.config.retry;

        tracing::info!(pending = total, "processing offline queue");

        let mut outcomes = Vec::with_capacity(total);
        let mut dropped = Vec::new();
        let mut successful = 0;
        let mut retries = 0u64;
        let mut last_error = None;

        for (index, mut entry) in snapshot.into_iter().enumerate() {
            let delay = policy.delay_for_attempt(entry.retry_count);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match dispatch(remote, &entry.operation).await {
                Ok(()) => {
                    tracing::debug!(op_id = %entry.id, kind = %entry.kind(), "replayed operation");
                    successful += 1;
                    outcomes.push((entry.id, EntryOutcome::Applied));
                }
                Err(e) => {
                    entry.retry_count += 1;
                    let error = e.to_string();
                    if policy.is_exhausted(entry.retry_count) {
                        tracing::error!(
                            op_id = %entry.id,
                            kind = %entry.kind(),
                            retry_count = entry.retry_count,
                            error = %error,
                            "dropping operation after exhausting retries"
                        );
                        outcomes.push((entry.id.clone(), EntryOutcome::Dropped));
                        dropped.push(DroppedOperation {
                            entry,
                            error: error.clone(),
                        });
                    } else {
                        tracing::warn!(
                            op_id = %entry.id,
                            kind = %entry.kind(),
                            retry_count = entry.retry_count,
                            max_attempts = policy.max_attempts,
                            error = %error,
                            "operation failed, will retry"
                        );
                        retries += 1;
                        outcomes.push((
                            entry.id,
                            EntryOutcome::Retry {
                                retry_count: entry.retry_count,
                            },
                        ));
                    }
                    last_error = Some(error);
                }
            }

            if let Some(on_progress) = hooks.on_progress.as_mut() {
                on_progress(Progress {
                    processed: index + 1,
                    total,
                    successful,
                    failed: dropped.len(),
                });
            }
        }

        self.queue.commit_pass(&outcomes);

        let report = ProcessReport {
            status: PassStatus::Completed,
            successful,
            failed: dropped.len(),
            remaining: self.queue.count(),
            dropped,
            duration: start.elapsed(),
        };

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.operations_replayed += report.successful as u64;
            stats.operations_dropped += report.failed as u64;
            stats.retries += retries;
            stats
                .unacknowledged_drops
                .extend(report.dropped.iter().cloned());
            stats.last_pass_time = Some(Instant::now());
            if last_error.is_some() {
                stats.last_error = last_error;
            }
        }

        tracing::info!(
            successful = report.successful,
            failed = report.failed,
            remaining = report.remaining,
            "offline queue pass complete"
        );

        if let Some(on_complete) = hooks.on_complete.take() {
            on_complete(&report);
        }
        report
    }
}

async fn dispatch<R: RemoteOperations>(remote: &R, operation: &Operation) -> SyncResult<()> {
    match operation {
        Operation::Save(record) => remote.save(record).await,
        Operation::Update(record) => remote.update(record).await,
        Operation::Delete(id) => remote.delete(id).await,
    }
}

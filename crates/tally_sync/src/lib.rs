//! # Tally Sync
//!
//! Offline operation queue with retry-on-reconnect.
//!
//! This crate provides:
//! - [`QueueStore`]: a durable FIFO of pending save/update/delete operations
//! - [`NetworkMonitor`]: online/offline signals with scoped subscriptions
//! - [`QueueProcessor`]: sequential replay against injected
//!   [`RemoteOperations`] with bounded retry
//! - [`SyncAgent`]: drains the queue whenever connectivity returns
//!
//! ## Key Invariants
//!
//! - Operations replay strictly in enqueue order, one at a time
//! - An operation leaves the queue only after it succeeds or after its
//!   retries are exhausted (5 attempts by default)
//! - Processing while offline is a no-op
//! - Operations enqueued during a pass are kept for the next pass
//! - Nothing in the queue path throws: failures become logs, counters and
//!   reports, and dropped operations stay visible through
//!   [`QueueProcessor::health`] until acknowledged
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use tally_core::{Operation, TransactionRecord};
//! use tally_storage::InMemoryStore;
//! use tally_sync::{ManualMonitor, MockRemote, ProcessorConfig, QueueProcessor, QueueStore};
//!
//! # tokio_test_main();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test_main() {
//! let queue = Arc::new(QueueStore::with_defaults(InMemoryStore::new()));
//! let network = Arc::new(ManualMonitor::offline());
//! let processor = QueueProcessor::new(queue, Arc::clone(&network), ProcessorConfig::default());
//!
//! processor
//!     .queue()
//!     .enqueue(Operation::Save(TransactionRecord::new("t1", "Coffee", 5.0)));
//!
//! let remote = MockRemote::new();
//! network.set_online(true);
//! let report = processor.process(&remote).await;
//! assert_eq!(report.successful, 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod config;
mod error;
mod network;
mod probe;
mod processor;
mod queue;
mod remote;

pub use agent::SyncAgent;
pub use config::{
    ProcessorConfig, QueueConfig, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_QUEUE_KEY,
};
pub use error::{SyncError, SyncResult};
pub use network::{ConnectivityListener, ManualMonitor, NetworkMonitor, Subscription};
pub use probe::{PollingMonitor, ReachabilityProbe, TcpProbe};
pub use processor::{
    DroppedOperation, PassStatus, ProcessHooks, ProcessReport, Progress, QueueProcessor,
    SyncHealth, SyncStats,
};
pub use queue::{EntryOutcome, QueueStore, UNREADABLE_SUFFIX};
pub use remote::{MockRemote, RemoteCall, RemoteFns, RemoteOperations};

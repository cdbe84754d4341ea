//! Polling connectivity monitor.
//!
//! For hosts without connectivity events, [`PollingMonitor`] runs a
//! [`ReachabilityProbe`] on a tokio interval and turns the results into
//! transitions on an inner [`ManualMonitor`].

use crate::network::{ConnectivityListener, ManualMonitor, NetworkMonitor, Subscription};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A check that decides whether the remote is reachable.
pub trait ReachabilityProbe: Send + Sync + 'static {
    /// Returns true if the remote appears reachable.
    fn check(&self) -> impl Future<Output = bool> + Send;
}

/// Probes reachability by opening a TCP connection.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe for `addr` (`host:port`) with a 3 second timeout.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(3),
        }
    }

    /// Sets the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ReachabilityProbe for TcpProbe {
    async fn check(&self) -> bool {
        let connect = tokio::net::TcpStream::connect(self.addr.as_str());
        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "reachability probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, "reachability probe timed out");
                false
            }
        }
    }
}

/// A monitor that polls a probe at a fixed interval.
///
/// Starts offline until the first probe completes. Must be started inside a
/// tokio runtime. The polling task ends on [`PollingMonitor::stop`] or drop.
pub struct PollingMonitor {
    state: ManualMonitor,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingMonitor {
    /// Spawns the polling task.
    pub fn spawn<P: ReachabilityProbe>(probe: P, interval: Duration) -> Self {
        let state = ManualMonitor::offline();
        let handle = state.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reachable = probe.check().await;
                handle.set_online(reachable);
            }
        });

        Self {
            state,
            task: Mutex::new(Some(task)),
        }
    }

    /// Stops polling. The last observed state is kept.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }

    /// Returns true while the polling task is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl NetworkMonitor for PollingMonitor {
    fn is_online(&self) -> bool {
        self.state.is_online()
    }

    fn subscribe(&self, listener: ConnectivityListener) -> Subscription {
        self.state.subscribe(listener)
    }
}

impl Drop for PollingMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    struct FlagProbe(Arc<AtomicBool>);

    impl ReachabilityProbe for FlagProbe {
        async fn check(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn polling_reports_transitions() {
        let reachable = Arc::new(AtomicBool::new(false));
        let monitor = PollingMonitor::spawn(
            FlagProbe(Arc::clone(&reachable)),
            Duration::from_millis(10),
        );

        let came_online = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&came_online);
        let _subscription = monitor.subscribe(ConnectivityListener::on_online(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert!(!monitor.is_online());
        reachable.store(true, Ordering::SeqCst);
        assert!(wait_until(|| monitor.is_online()).await);
        assert_eq!(came_online.load(Ordering::SeqCst), 1);

        reachable.store(false, Ordering::SeqCst);
        assert!(wait_until(|| !monitor.is_online()).await);
    }

    #[tokio::test]
    async fn stop_aborts_task() {
        let monitor = PollingMonitor::spawn(
            FlagProbe(Arc::new(AtomicBool::new(true))),
            Duration::from_millis(10),
        );
        assert!(monitor.is_running());

        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn tcp_probe_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let probe = TcpProbe::new(addr.clone()).with_timeout(Duration::from_millis(500));
        assert!(probe.check().await);

        drop(listener);
        assert!(!probe.check().await);
    }
}

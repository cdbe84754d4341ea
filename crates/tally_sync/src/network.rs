//! Connectivity monitoring.
//!
//! A [`NetworkMonitor`] reports whether the host believes it is online and
//! notifies subscribers on transitions. Host connectivity signals are a weak
//! indicator: being "online" does not prove the remote API is reachable, so
//! replay failures are still expected while online.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback = Arc<dyn Fn() + Send + Sync>;

/// The pair of callbacks registered with a monitor.
#[derive(Clone)]
pub struct ConnectivityListener {
    on_online: Callback,
    on_offline: Callback,
}

impl ConnectivityListener {
    /// Creates a listener from both callbacks.
    pub fn new<F, G>(on_online: F, on_offline: G) -> Self
    where
        F: Fn() + Send + Sync + 'static,
        G: Fn() + Send + Sync + 'static,
    {
        Self {
            on_online: Arc::new(on_online),
            on_offline: Arc::new(on_offline),
        }
    }

    /// Creates a listener that only reacts to coming online.
    pub fn on_online<F>(on_online: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::new(on_online, || {})
    }

    fn notify(&self, online: bool) {
        if online {
            (self.on_online)();
        } else {
            (self.on_offline)();
        }
    }
}

impl fmt::Debug for ConnectivityListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityListener").finish_non_exhaustive()
    }
}

/// Source of online/offline signals.
pub trait NetworkMonitor: Send + Sync {
    /// Returns the current connectivity state.
    fn is_online(&self) -> bool;

    /// Registers `listener` for transitions.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    fn subscribe(&self, listener: ConnectivityListener) -> Subscription;
}

impl<T: NetworkMonitor + ?Sized> NetworkMonitor for Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn subscribe(&self, listener: ConnectivityListener) -> Subscription {
        (**self).subscribe(listener)
    }
}

/// Scoped registration handle. Unregisters on drop.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    unregister: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Creates a subscription that runs `unregister` exactly once.
    pub fn new<F>(unregister: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            unregister: Some(Box::new(unregister)),
        }
    }

    /// Unregisters the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unregister) = self.unregister.take() {
            unregister();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unregister.is_some())
            .finish()
    }
}

#[derive(Default)]
struct Listeners {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, ConnectivityListener)>>,
}

/// A monitor driven by the host application.
///
/// The host calls [`ManualMonitor::set_online`] from whatever platform signal
/// it has. Listeners fire only on an actual transition; there is no
/// debouncing. Clones share state.
#[derive(Clone)]
pub struct ManualMonitor {
    online: Arc<AtomicBool>,
    listeners: Arc<Listeners>,
}

impl ManualMonitor {
    /// Creates a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(online)),
            listeners: Arc::new(Listeners::default()),
        }
    }

    /// Creates a monitor that starts online.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Creates a monitor that starts offline.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Updates the state and notifies listeners if it changed.
    ///
    /// Returns true if this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        tracing::info!(online, "connectivity changed");

        // Call outside the lock so listeners may subscribe or unsubscribe.
        let listeners: Vec<ConnectivityListener> = self
            .listeners
            .entries
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.notify(online);
        }
        true
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.entries.lock().len()
    }
}

impl Default for ManualMonitor {
    fn default() -> Self {
        Self::online()
    }
}

impl fmt::Debug for ManualMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualMonitor")
            .field("online", &self.is_online())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl NetworkMonitor for ManualMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self, listener: ConnectivityListener) -> Subscription {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.entries.lock().push((id, listener));

        let listeners: Weak<Listeners> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.entries.lock().retain(|(entry, _)| *entry != id);
            }
        })
    }
}

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Invoked each time the network becomes available
pub type ConnectivityCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Source of "network available" events
pub trait ConnectivityMonitor: Send + Sync {
    fn subscribe(&self, on_available: ConnectivityCallback) -> SubscriptionHandle;

    /// Cancelling an unknown or already cancelled handle is a no-op
    fn cancel(&self, handle: SubscriptionHandle);
}

/// Monitor whose events are raised explicitly, by a probe or by a test
#[derive(Default)]
pub struct ManualConnectivity {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, ConnectivityCallback>>,
}

impl ManualConnectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the available event; returns how many subscribers were notified
    pub fn notify_available(&self) -> usize {
        let callbacks: Vec<ConnectivityCallback> = {
            let subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
            subscribers.values().cloned().collect()
        };

        debug!("Connectivity available, notifying {} subscriber(s)", callbacks.len());
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn subscribe(&self, on_available: ConnectivityCallback) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, on_available);
        SubscriptionHandle(id)
    }

    fn cancel(&self, handle: SubscriptionHandle) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.0);
    }
}

use super::connectivity::{ConnectivityMonitor, SubscriptionHandle};
use super::intent::ResumeIntent;
use super::prefs::PreferenceStore;
use crate::error::DurabilityError;
use crate::sync::SyncSignal;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What the boot-time check found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootOutcome {
    /// No recording was in progress
    Idle,
    /// A recording was cut off by the restart; capture is not resumed
    Interrupted { session_id: Option<String> },
}

struct Activation {
    session_id: String,
    subscription: SubscriptionHandle,
    /// `None` once capture has ended but queued chunks still need sweeps
    keepalive: Option<JoinHandle<()>>,
}

/// Keeps an in-progress recording recoverable.
///
/// While active it holds the resume flag in the preference store, a
/// keep-alive task, and a connectivity subscription that asks the upload
/// coordinator to sweep its pending queue.
///
/// A capture failure only suspends the guard: the recording is over, but the
/// subscription stays until an explicit stop or process reclaim, so chunks
/// parked before the failure are still retried on reconnect.
pub struct DurabilityGuard {
    prefs: Arc<dyn PreferenceStore>,
    monitor: Arc<dyn ConnectivityMonitor>,
    signals: mpsc::UnboundedSender<SyncSignal>,
    keepalive_interval: Duration,
    active: Mutex<Option<Activation>>,
}

impl DurabilityGuard {
    pub fn new(
        prefs: Arc<dyn PreferenceStore>,
        monitor: Arc<dyn ConnectivityMonitor>,
        signals: mpsc::UnboundedSender<SyncSignal>,
    ) -> Self {
        Self {
            prefs,
            monitor,
            signals,
            keepalive_interval: Duration::from_secs(30),
            active: Mutex::new(None),
        }
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// A recording is in progress (armed and not suspended)
    pub fn is_active(&self) -> bool {
        self.lock_active()
            .as_ref()
            .is_some_and(|a| a.keepalive.is_some())
    }

    /// Connectivity signals are still forwarded to the coordinator
    pub fn is_listening(&self) -> bool {
        self.lock_active().is_some()
    }

    pub fn session_id(&self) -> Option<String> {
        self.lock_active().as_ref().map(|a| a.session_id.clone())
    }

    /// Arm the guard for `session_id`. Must run inside a tokio runtime.
    pub fn activate(&self, session_id: &str) -> Result<(), DurabilityError> {
        ResumeIntent::active(session_id).save(self.prefs.as_ref())?;

        let signals = self.signals.clone();
        let subscription = self.monitor.subscribe(Arc::new(move || {
            if signals.send(SyncSignal::ConnectivityRestored).is_err() {
                debug!("Upload coordinator gone, dropping connectivity signal");
            }
        }));

        let keepalive = tokio::spawn(keepalive_loop(
            session_id.to_string(),
            self.keepalive_interval,
        ));

        let previous = self.lock_active().replace(Activation {
            session_id: session_id.to_string(),
            subscription,
            keepalive: Some(keepalive),
        });
        if let Some(previous) = previous {
            self.release(previous);
        }

        info!("Durability guard armed for session {}", session_id);
        Ok(())
    }

    /// Disarm after an explicit stop
    pub fn deactivate(&self) -> Result<(), DurabilityError> {
        if let Some(activation) = self.lock_active().take() {
            info!(
                "Durability guard released for session {}",
                activation.session_id
            );
            self.release(activation);
        }
        ResumeIntent::cleared().save(self.prefs.as_ref())
    }

    /// Capture ended without a stop. The keep-alive goes and the resume flag
    /// is cleared, but connectivity signals keep flowing.
    pub fn suspend(&self) -> Result<(), DurabilityError> {
        if let Some(activation) = self.lock_active().as_mut() {
            if let Some(keepalive) = activation.keepalive.take() {
                keepalive.abort();
                info!(
                    "Durability guard suspended for session {}, still listening for connectivity",
                    activation.session_id
                );
            }
        }
        ResumeIntent::cleared().save(self.prefs.as_ref())
    }

    /// The OS is reclaiming the process
    pub fn on_process_reclaimed(&self) -> Result<(), DurabilityError> {
        warn!("Process reclaimed while guard active: {}", self.is_active());
        self.deactivate()
    }

    fn release(&self, activation: Activation) {
        self.monitor.cancel(activation.subscription);
        if let Some(keepalive) = activation.keepalive {
            keepalive.abort();
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<Activation>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for DurabilityGuard {
    // Dropping is not a stop; the resume flag stays as it is
    fn drop(&mut self) {
        if let Some(activation) = self.lock_active().take() {
            self.release(activation);
        }
    }
}

async fn keepalive_loop(session_id: String, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        debug!("Keep-alive: session {} still recording", session_id);
    }
}

/// Boot-time handler.
///
/// A set resume flag means a recording was cut off by a restart. The audio
/// buffer is gone, so capture is not restarted; the interruption is reported
/// and the flag cleared so it is surfaced exactly once.
pub fn boot_check(prefs: &dyn PreferenceStore) -> Result<BootOutcome, DurabilityError> {
    let intent = ResumeIntent::load(prefs)?;
    if !intent.should_resume {
        debug!("Boot check: no interrupted recording");
        return Ok(BootOutcome::Idle);
    }

    warn!(
        "Recording of session {} was interrupted by a restart",
        intent.session_id.as_deref().unwrap_or("<unknown>")
    );
    ResumeIntent::cleared().save(prefs)?;

    Ok(BootOutcome::Interrupted {
        session_id: intent.session_id,
    })
}

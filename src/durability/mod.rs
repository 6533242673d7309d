//! Durability of an in-progress recording
//!
//! This module keeps a recording recoverable across process death:
//! - Persisted resume flag in a key-value preference store
//! - Keep-alive task while recording
//! - Connectivity subscription that triggers pending-upload sweeps
//! - Boot-time check that reports interrupted recordings

pub mod connectivity;
pub mod guard;
pub mod intent;
pub mod prefs;
pub mod probe;

pub use connectivity::{
    ConnectivityCallback, ConnectivityMonitor, ManualConnectivity, SubscriptionHandle,
};
pub use guard::{boot_check, BootOutcome, DurabilityGuard};
pub use intent::{ResumeIntent, RESUME_NAMESPACE};
pub use prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
pub use probe::spawn_health_probe;

//! Client-side upload synchronization
//!
//! - `state`: the recording state machine as a pure transition function
//! - `retry`: bounded backoff schedule
//! - `coordinator`: per-chunk upload/confirm with a pending-retry queue

mod coordinator;
mod retry;
mod state;

pub use coordinator::{
    ChunkOutcome, ChunkStatus, CoordinatorError, PendingChunk, PendingStage, SweepReport,
    SyncSignal, UploadCoordinator,
};
pub use retry::RetryPolicy;
pub use state::{transition, InvalidTransition, RecordingEvent, RecordingState};

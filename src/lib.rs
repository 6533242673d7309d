pub mod capture;
pub mod client;
pub mod config;
pub mod durability;
pub mod error;
pub mod http;
pub mod ledger;
pub mod messages;
pub mod service;
pub mod sync;

pub use capture::{
    AudioFile, AudioFrame, ChunkConfig, ChunkMetadata, ChunkSequencer, ChunkedRecorder, ReadyChunk,
};
pub use client::{ChunkTransport, TransferClient, TransferError};
pub use config::Config;
pub use durability::{boot_check, BootOutcome, DurabilityGuard, ManualConnectivity};
pub use error::{DurabilityError, LedgerError};
pub use http::{create_router, AppState};
pub use ledger::{BlobStore, Chunk, FileLedger, InMemoryLedger, Session, SessionStore};
pub use service::{RecordingService, UserCommand};
pub use sync::{
    ChunkOutcome, ChunkStatus, RecordingEvent, RecordingState, RetryPolicy, SyncSignal,
    UploadCoordinator,
};

//! Server-side session ledger
//!
//! This module owns the authoritative record of upload sessions and chunks:
//! - `SessionStore` trait with in-memory and JSON-snapshot implementations
//! - `test_NNN` session id allocation with live-uniqueness checks
//! - Idempotent chunk recording keyed by chunk number
//! - On-disk storage of uploaded chunk bytes

pub mod blob;
pub mod id;
pub mod model;
pub mod snapshot;
pub mod store;

pub use blob::BlobStore;
pub use id::{IdSource, RandomIds, SequenceIds};
pub use model::{chunk_filename, Chunk, ChunkUpload, RecordOutcome, Session, SessionStatus};
pub use snapshot::FileLedger;
pub use store::{InMemoryLedger, SessionStore};

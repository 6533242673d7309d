//! HTTP surface of the session ledger
//!
//! This module provides the REST API the recording clients talk to:
//! - POST /upload-session - Create an upload session
//! - POST /get-presigned-url - Get the upload target for a chunk
//! - POST /upload-chunk/:id/:n - Upload chunk bytes (multipart `audio`)
//! - POST /notify-chunk-uploaded - Confirm an uploaded chunk
//! - GET /all-session - List sessions and chunks
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::{create_router, MAX_CHUNK_BYTES};
pub use state::AppState;

use crate::ledger::{BlobStore, SessionStore};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Session ledger (in-memory or snapshot-backed)
    pub store: Arc<dyn SessionStore>,

    /// Chunk byte storage
    pub blobs: BlobStore,

    /// Base URL used to build presigned upload targets
    pub public_url: String,

    /// Lifetime advertised for presigned targets
    pub presign_expires_secs: u64,
}

impl AppState {
    pub fn new(store: Arc<dyn SessionStore>, blobs: BlobStore, public_url: impl Into<String>) -> Self {
        Self {
            store,
            blobs,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            presign_expires_secs: 3600,
        }
    }

    pub fn with_presign_expiry(mut self, secs: u64) -> Self {
        self.presign_expires_secs = secs;
        self
    }

    pub fn upload_target(&self, session_id: &str, chunk_number: u32) -> String {
        format!(
            "{}/upload-chunk/{}/{}",
            self.public_url, session_id, chunk_number
        )
    }
}

use super::model::chunk_filename;
use crate::error::{LedgerError, LedgerResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stores uploaded chunk bytes on disk under `<root>/<session_id>/chunk_<n>.wav`
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_path(&self, session_id: &str, chunk_number: u32) -> PathBuf {
        self.root
            .join(session_id)
            .join(chunk_filename(chunk_number))
    }

    /// Write chunk bytes and return the path they were stored at
    pub async fn write_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
    ) -> LedgerResult<PathBuf> {
        if session_id.contains(&['/', '\\'][..]) || session_id.contains("..") {
            return Err(LedgerError::validation("Invalid session id"));
        }

        let path = self.chunk_path(session_id, chunk_number);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LedgerError::storage)?;
        }

        tokio::fs::write(&path, bytes)
            .await
            .map_err(LedgerError::storage)?;

        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }
}

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

/// A finished chunk file that is ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyChunk {
    pub session_id: String,
    pub chunk_number: u32,
    pub path: PathBuf,
    pub size: u64,
}

/// Numbers finished chunk files for one session and queues them for upload.
///
/// Numbers start at 0, are handed out once each in submission order and are
/// never skipped. A file whose size cannot be read does not consume a number.
pub struct ChunkSequencer {
    session_id: String,
    next: u32,
    tx: mpsc::Sender<ReadyChunk>,
}

impl ChunkSequencer {
    pub fn new(session_id: impl Into<String>, tx: mpsc::Sender<ReadyChunk>) -> Self {
        Self {
            session_id: session_id.into(),
            next: 0,
            tx,
        }
    }

    /// Sequencer plus the receiving end the upload side consumes
    pub fn channel(
        session_id: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ReadyChunk>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(session_id, tx), rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number the next submitted file will receive
    pub fn next_chunk_number(&self) -> u32 {
        self.next
    }

    /// Assign the next chunk number to `path` and queue it for upload
    pub async fn submit(&mut self, path: PathBuf) -> Result<ReadyChunk> {
        let size = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Failed to stat chunk file: {:?}", path))?
            .len();

        let chunk = ReadyChunk {
            session_id: self.session_id.clone(),
            chunk_number: self.next,
            path,
            size,
        };
        self.next += 1;

        info!(
            "Chunk {} of session {} ready ({} bytes)",
            chunk.chunk_number, chunk.session_id, chunk.size
        );

        self.tx
            .send(chunk.clone())
            .await
            .context("Upload queue closed")?;

        Ok(chunk)
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a server-side session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
}

/// A server-tracked grouping of chunks belonging to one recording attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Short visible identifier (e.g., "test_042")
    pub id: String,

    pub created_at: DateTime<Utc>,

    pub status: SessionStatus,

    /// Chunks in insertion order
    pub chunks: Vec<Chunk>,

    /// Always equal to `chunks.len()`
    pub total_chunks: usize,
}

impl Session {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            status: SessionStatus::Active,
            chunks: Vec::new(),
            total_chunks: 0,
        }
    }

    pub fn chunk(&self, chunk_number: u32) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.chunk_number == chunk_number)
    }

    pub(crate) fn chunk_mut(&mut self, chunk_number: u32) -> Option<&mut Chunk> {
        self.chunks
            .iter_mut()
            .find(|c| c.chunk_number == chunk_number)
    }

    /// Appends a chunk and keeps `total_chunks` in step with the list
    pub(crate) fn push_chunk(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
        self.total_chunks = self.chunks.len();
    }

    pub fn confirmed_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.confirmed).count()
    }
}

/// A numbered audio segment recorded against a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub session_id: String,
    pub chunk_number: u32,
    pub filename: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub confirmed: bool,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub storage_path: String,
}

/// File metadata supplied when a chunk is first recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUpload {
    pub filename: String,
    pub size: u64,
    pub storage_path: String,
}

/// Canonical stored filename for a chunk number
pub fn chunk_filename(chunk_number: u32) -> String {
    format!("chunk_{}.wav", chunk_number)
}

/// Result of `record_chunk`: the stored chunk and whether this call created it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordOutcome {
    pub chunk: Chunk,
    pub created: bool,
}

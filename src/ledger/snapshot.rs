use super::blob::BlobStore;
use super::model::{Chunk, ChunkUpload, RecordOutcome, Session};
use super::store::{InMemoryLedger, SessionStore};
use crate::error::{LedgerError, LedgerResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    sessions: Vec<Session>,
}

const SNAPSHOT_VERSION: u32 = 1;

/// Ledger that survives restarts by writing a JSON snapshot after every
/// mutation.
///
/// Reads are served from memory. Snapshot writes go to a temp file that is
/// renamed over the previous snapshot, so a crash mid-write leaves the last
/// good copy in place. If a write fails, the ledger stays dirty and the next
/// mutation (a repeated chunk included) writes the snapshot again.
pub struct FileLedger {
    inner: InMemoryLedger,
    path: PathBuf,
    write_lock: Mutex<()>,
    dirty: AtomicBool,
}

impl FileLedger {
    /// Open (or start) a ledger backed by `path`
    pub async fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();

        let sessions = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let snapshot: SnapshotFile =
                    serde_json::from_slice(&bytes).map_err(LedgerError::storage)?;
                info!(
                    "Loaded ledger snapshot from {} ({} sessions)",
                    path.display(),
                    snapshot.sessions.len()
                );
                snapshot.sessions
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No ledger snapshot at {}, starting empty", path.display());
                Vec::new()
            }
            Err(e) => return Err(LedgerError::storage(e)),
        };

        Ok(Self {
            inner: InMemoryLedger::from_sessions(sessions),
            path,
            write_lock: Mutex::new(()),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> LedgerResult<()> {
        let _guard = self.write_lock.lock().await;

        let result = self.write_snapshot().await;
        if let Err(e) = &result {
            warn!("Ledger snapshot write failed, will retry: {}", e);
        }
        self.dirty.store(result.is_err(), Ordering::SeqCst);
        result
    }

    /// Persist after a chunk write unless nothing changed and the last
    /// snapshot made it to disk
    async fn persist_outcome(&self, outcome: RecordOutcome) -> LedgerResult<RecordOutcome> {
        if outcome.created || self.dirty.load(Ordering::SeqCst) {
            self.persist().await?;
        }
        Ok(outcome)
    }

    async fn write_snapshot(&self) -> LedgerResult<()> {
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            sessions: self.inner.list_sessions().await?,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(LedgerError::storage)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LedgerError::storage)?;
        }

        let tmp = self
            .path
            .with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(LedgerError::storage)?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(LedgerError::storage(e));
        }

        debug!("Wrote ledger snapshot ({} bytes)", bytes.len());
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileLedger {
    async fn create_session(&self) -> LedgerResult<Session> {
        let session = self.inner.create_session().await?;
        self.persist().await?;
        Ok(session)
    }

    async fn lookup(&self, session_id: &str) -> LedgerResult<Session> {
        self.inner.lookup(session_id).await
    }

    async fn record_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        upload: ChunkUpload,
    ) -> LedgerResult<RecordOutcome> {
        let outcome = self
            .inner
            .record_chunk(session_id, chunk_number, upload)
            .await?;
        self.persist_outcome(outcome).await
    }

    async fn store_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
        blobs: &BlobStore,
    ) -> LedgerResult<RecordOutcome> {
        let outcome = self
            .inner
            .store_chunk(session_id, chunk_number, bytes, blobs)
            .await?;
        self.persist_outcome(outcome).await
    }

    async fn confirm_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        checksum: Option<String>,
    ) -> LedgerResult<Chunk> {
        let chunk = self
            .inner
            .confirm_chunk(session_id, chunk_number, checksum)
            .await?;
        self.persist().await?;
        Ok(chunk)
    }

    async fn list_sessions(&self) -> LedgerResult<Vec<Session>> {
        self.inner.list_sessions().await
    }
}

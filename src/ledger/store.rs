use super::blob::BlobStore;
use super::id::{allocate_session_id, IdSource, RandomIds};
use super::model::{chunk_filename, Chunk, ChunkUpload, RecordOutcome, Session};
use crate::error::{LedgerError, LedgerResult};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Authoritative session/chunk storage behind the HTTP surface.
///
/// All chunk mutation goes through `record_chunk` and `confirm_chunk`, which
/// keeps `total_chunks` consistent with the chunk list.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Allocate a fresh session with an empty chunk list
    async fn create_session(&self) -> LedgerResult<Session>;

    async fn lookup(&self, session_id: &str) -> LedgerResult<Session>;

    /// Record a chunk once; a repeated chunk number returns the stored record
    async fn record_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        upload: ChunkUpload,
    ) -> LedgerResult<RecordOutcome>;

    /// Like `record_chunk`, but also writes `bytes` to `blobs` while the
    /// session is locked. A repeated chunk number leaves the stored file as
    /// it is.
    async fn store_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
        blobs: &BlobStore,
    ) -> LedgerResult<RecordOutcome>;

    async fn confirm_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        checksum: Option<String>,
    ) -> LedgerResult<Chunk>;

    /// Snapshot of every session, oldest first
    async fn list_sessions(&self) -> LedgerResult<Vec<Session>>;
}

type SessionCell = Arc<Mutex<Session>>;

/// In-memory ledger with one lock per session.
///
/// The outer map lock is only held long enough to find or insert a session,
/// so mutations on different sessions never wait on each other.
pub struct InMemoryLedger {
    sessions: RwLock<HashMap<String, SessionCell>>,
    ids: Box<dyn IdSource>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::with_id_source(RandomIds)
    }

    pub fn with_id_source(ids: impl IdSource + 'static) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ids: Box::new(ids),
        }
    }

    /// Rebuild a ledger from previously persisted sessions
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        let map = sessions
            .into_iter()
            .map(|mut session| {
                session.total_chunks = session.chunks.len();
                (session.id.clone(), Arc::new(Mutex::new(session)))
            })
            .collect();

        Self {
            sessions: RwLock::new(map),
            ids: Box::new(RandomIds),
        }
    }

    async fn cell(&self, session_id: &str) -> LedgerResult<SessionCell> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| LedgerError::SessionNotFound(session_id.to_string()))
    }

    /// Insert a chunk unless its number is already recorded. `write` runs
    /// under the session lock and only for a new chunk number.
    async fn record_with<F, Fut>(
        &self,
        session_id: &str,
        chunk_number: u32,
        write: F,
    ) -> LedgerResult<RecordOutcome>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = LedgerResult<ChunkUpload>> + Send,
    {
        let cell = self.cell(session_id).await?;
        let mut session = cell.lock().await;

        if let Some(existing) = session.chunk(chunk_number) {
            debug!(
                "Chunk {} already recorded for session {}, skipping",
                chunk_number, session_id
            );
            return Ok(RecordOutcome {
                chunk: existing.clone(),
                created: false,
            });
        }

        let upload = write().await?;
        let chunk = Chunk {
            session_id: session_id.to_string(),
            chunk_number,
            filename: upload.filename,
            size: upload.size,
            uploaded_at: Utc::now(),
            confirmed: false,
            confirmed_at: None,
            checksum: None,
            storage_path: upload.storage_path,
        };
        session.push_chunk(chunk.clone());

        info!(
            "Recorded chunk {} for session {} ({} bytes, {} total)",
            chunk_number, session_id, chunk.size, session.total_chunks
        );

        Ok(RecordOutcome {
            chunk,
            created: true,
        })
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemoryLedger {
    async fn create_session(&self) -> LedgerResult<Session> {
        let mut sessions = self.sessions.write().await;
        let id = allocate_session_id(self.ids.as_ref(), |c| sessions.contains_key(c))?;

        let session = Session::new(id.clone());
        sessions.insert(id.clone(), Arc::new(Mutex::new(session.clone())));

        info!("Created upload session: {}", id);
        Ok(session)
    }

    async fn lookup(&self, session_id: &str) -> LedgerResult<Session> {
        let cell = self.cell(session_id).await?;
        let session = cell.lock().await;
        Ok(session.clone())
    }

    async fn record_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        upload: ChunkUpload,
    ) -> LedgerResult<RecordOutcome> {
        self.record_with(session_id, chunk_number, move || async move { Ok(upload) })
            .await
    }

    async fn store_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        bytes: &[u8],
        blobs: &BlobStore,
    ) -> LedgerResult<RecordOutcome> {
        self.record_with(session_id, chunk_number, || async move {
            let path = blobs.write_chunk(session_id, chunk_number, bytes).await?;
            Ok(ChunkUpload {
                filename: chunk_filename(chunk_number),
                size: bytes.len() as u64,
                storage_path: path.display().to_string(),
            })
        })
        .await
    }

    async fn confirm_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        checksum: Option<String>,
    ) -> LedgerResult<Chunk> {
        let cell = self.cell(session_id).await?;
        let mut session = cell.lock().await;

        let chunk = session
            .chunk_mut(chunk_number)
            .ok_or_else(|| LedgerError::ChunkNotFound {
                session_id: session_id.to_string(),
                chunk_number,
            })?;

        // Clock skew must never put confirmation before the upload
        chunk.confirmed_at = Some(Utc::now().max(chunk.uploaded_at));
        chunk.confirmed = true;
        if checksum.is_some() {
            chunk.checksum = checksum;
        }

        info!("Confirmed chunk {} for session {}", chunk_number, session_id);
        Ok(chunk.clone())
    }

    async fn list_sessions(&self) -> LedgerResult<Vec<Session>> {
        let cells: Vec<SessionCell> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        let mut snapshot = Vec::with_capacity(cells.len());
        for cell in cells {
            snapshot.push(cell.lock().await.clone());
        }
        snapshot.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::id::SequenceIds;
    use tempfile::TempDir;

    fn upload(n: u32, size: u64) -> ChunkUpload {
        ChunkUpload {
            filename: chunk_filename(n),
            size,
            storage_path: format!("uploads/s/{}", chunk_filename(n)),
        }
    }

    #[tokio::test]
    async fn new_session_starts_empty() {
        let ledger = InMemoryLedger::with_id_source(SequenceIds::new([42]));
        let session = ledger.create_session().await.unwrap();

        assert_eq!(session.id, "test_042");
        assert!(session.chunks.is_empty());
        assert_eq!(session.total_chunks, 0);
    }

    #[tokio::test]
    async fn duplicate_record_is_a_noop() {
        let ledger = InMemoryLedger::new();
        let id = ledger.create_session().await.unwrap().id;

        let first = ledger.record_chunk(&id, 0, upload(0, 100)).await.unwrap();
        let second = ledger.record_chunk(&id, 0, upload(0, 999)).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.chunk, second.chunk);

        let session = ledger.lookup(&id).await.unwrap();
        assert_eq!(session.total_chunks, 1);
        assert_eq!(session.chunks.len(), 1);
    }

    #[tokio::test]
    async fn out_of_order_chunks_keep_count_consistent() {
        let ledger = InMemoryLedger::new();
        let id = ledger.create_session().await.unwrap().id;

        for n in [2, 0, 1, 2, 0] {
            ledger.record_chunk(&id, n, upload(n, 10)).await.unwrap();
            let session = ledger.lookup(&id).await.unwrap();
            assert_eq!(session.total_chunks, session.chunks.len());
        }

        let session = ledger.lookup(&id).await.unwrap();
        let order: Vec<u32> = session.chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[tokio::test]
    async fn confirm_requires_recorded_chunk() {
        let ledger = InMemoryLedger::new();
        let id = ledger.create_session().await.unwrap().id;

        let err = ledger.confirm_chunk(&id, 3, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::ChunkNotFound { chunk_number: 3, .. }));

        let err = ledger.confirm_chunk("test_nope", 0, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn confirm_sets_timestamps_and_checksum() {
        let ledger = InMemoryLedger::new();
        let id = ledger.create_session().await.unwrap().id;
        ledger.record_chunk(&id, 0, upload(0, 10)).await.unwrap();

        let chunk = ledger
            .confirm_chunk(&id, 0, Some("abc123".to_string()))
            .await
            .unwrap();

        assert!(chunk.confirmed);
        assert!(chunk.confirmed_at.unwrap() >= chunk.uploaded_at);
        assert_eq!(chunk.checksum.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn concurrent_duplicate_uploads_record_once() {
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.create_session().await.unwrap().id;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                ledger.record_chunk(&id, 7, upload(7, 64)).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(ledger.lookup(&id).await.unwrap().total_chunks, 1);
    }

    #[tokio::test]
    async fn concurrent_stores_keep_ledger_and_file_in_step() {
        let dir = TempDir::new().unwrap();
        let blobs = BlobStore::new(dir.path());
        let ledger = Arc::new(InMemoryLedger::new());
        let id = ledger.create_session().await.unwrap().id;

        let mut handles = Vec::new();
        for i in 1..=8usize {
            let ledger = Arc::clone(&ledger);
            let blobs = blobs.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let bytes = vec![i as u8; i * 10_000];
                ledger.store_chunk(&id, 0, &bytes, &blobs).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().created {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let session = ledger.lookup(&id).await.unwrap();
        let chunk = session.chunk(0).unwrap();
        let stored = std::fs::read(blobs.chunk_path(&id, 0)).unwrap();
        assert_eq!(stored.len() as u64, chunk.size);
    }

    #[tokio::test]
    async fn repeated_store_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let blobs = BlobStore::new(dir.path());
        let ledger = InMemoryLedger::new();
        let id = ledger.create_session().await.unwrap().id;

        ledger.store_chunk(&id, 2, b"first", &blobs).await.unwrap();
        let again = ledger.store_chunk(&id, 2, b"second!", &blobs).await.unwrap();

        assert!(!again.created);
        assert_eq!(again.chunk.size, 5);
        assert_eq!(std::fs::read(blobs.chunk_path(&id, 2)).unwrap(), b"first");
    }

    #[tokio::test]
    async fn store_for_unknown_session_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let blobs = BlobStore::new(dir.path());
        let ledger = InMemoryLedger::new();

        let err = ledger
            .store_chunk("test_404", 0, b"data", &blobs)
            .await
            .unwrap_err();

        assert!(matches!(err, LedgerError::SessionNotFound(_)));
        assert!(!blobs.chunk_path("test_404", 0).exists());
    }
}

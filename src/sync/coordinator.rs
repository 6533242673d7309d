use super::retry::RetryPolicy;
use super::state::{transition, InvalidTransition, RecordingEvent, RecordingState};
use crate::capture::ReadyChunk;
use crate::client::{ChunkTransport, TransferError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

/// Where a chunk stands on its way to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkStatus {
    Uploading,
    /// Stored by the server, confirmation outstanding
    Uploaded,
    Confirmed,
    /// Upload retries exhausted; waiting for connectivity
    PendingUpload,
    /// Uploaded, but confirmation retries exhausted
    PendingConfirm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PendingStage {
    Upload,
    Confirm,
}

/// A chunk parked until the next connectivity sweep
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChunk {
    pub session_id: String,
    pub chunk_number: u32,
    #[serde(skip)]
    pub chunk: ReadyChunk,
    pub stage: PendingStage,
    pub last_error: String,
}

/// Result of handing one chunk to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Confirmed,
    PendingUpload,
    PendingConfirm,
    /// Another attempt for the same chunk is running
    AlreadyInFlight,
    AlreadyConfirmed,
}

/// Counts from one pass over the pending queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub attempted: usize,
    pub confirmed: usize,
    pub still_pending: usize,
}

/// Signals delivered to a running coordinator from outside the upload path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSignal {
    ConnectivityRestored,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("could not open an upload session: {0}")]
    SessionUnavailable(TransferError),
}

type ChunkKey = (String, u32);

fn key_of(chunk: &ReadyChunk) -> ChunkKey {
    (chunk.session_id.clone(), chunk.chunk_number)
}

struct Inner {
    state: RecordingState,
    session_id: Option<String>,
    statuses: HashMap<ChunkKey, ChunkStatus>,
    in_flight: HashSet<ChunkKey>,
    pending: VecDeque<PendingChunk>,
}

/// Drives the recording state machine and moves chunks to the ledger.
///
/// Each chunk is uploaded, then confirmed, each step under the retry policy.
/// Chunks that exhaust their attempts are parked in a pending queue which is
/// swept again when connectivity returns; nothing is dropped except on an
/// explicit stop. At most one attempt per chunk runs at a time.
pub struct UploadCoordinator {
    transport: Arc<dyn ChunkTransport>,
    policy: RetryPolicy,
    inner: Mutex<Inner>,
}

impl UploadCoordinator {
    pub fn new(transport: Arc<dyn ChunkTransport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            inner: Mutex::new(Inner {
                state: RecordingState::Stopped,
                session_id: None,
                statuses: HashMap::new(),
                in_flight: HashSet::new(),
                pending: VecDeque::new(),
            }),
        }
    }

    pub async fn state(&self) -> RecordingState {
        self.inner.lock().await.state
    }

    /// Session opened by the last successful `start`
    pub async fn session_id(&self) -> Option<String> {
        self.inner.lock().await.session_id.clone()
    }

    /// Apply an event to the state machine; rejected events change nothing
    pub async fn apply(&self, event: RecordingEvent) -> Result<RecordingState, InvalidTransition> {
        let mut inner = self.inner.lock().await;
        match transition(inner.state, event) {
            Ok(next) => {
                info!("Recording state: {} --{}--> {}", inner.state, event, next);
                inner.state = next;
                Ok(next)
            }
            Err(e) => {
                warn!("Ignoring event: {}", e);
                Err(e)
            }
        }
    }

    /// Enter `recording` and open a fresh upload session
    pub async fn start(&self) -> Result<String, CoordinatorError> {
        self.apply(RecordingEvent::Start).await?;

        let transport = Arc::clone(&self.transport);
        match self
            .with_retry("create session", || {
                let transport = Arc::clone(&transport);
                async move { transport.create_session().await }
            })
            .await
        {
            Ok(session_id) => {
                info!("Recording into session {}", session_id);
                self.inner.lock().await.session_id = Some(session_id.clone());
                Ok(session_id)
            }
            Err(e) => {
                error!("Could not open upload session: {}", e);
                let _ = self.apply(RecordingEvent::CaptureFailure).await;
                Err(CoordinatorError::SessionUnavailable(e))
            }
        }
    }

    pub async fn pause(&self) -> Result<RecordingState, InvalidTransition> {
        self.apply(RecordingEvent::Pause).await
    }

    pub async fn resume(&self) -> Result<RecordingState, InvalidTransition> {
        self.apply(RecordingEvent::Resume).await
    }

    /// Stop recording and drop queued retries of the active session.
    ///
    /// Attempts already running are left to finish. Returns how many pending
    /// chunks were dropped.
    pub async fn stop(&self) -> Result<usize, InvalidTransition> {
        self.apply(RecordingEvent::Stop).await?;

        let mut inner = self.inner.lock().await;
        let Some(session_id) = inner.session_id.take() else {
            return Ok(0);
        };

        let before = inner.pending.len();
        let mut dropped = Vec::new();
        inner.pending.retain(|p| {
            if p.session_id == session_id {
                dropped.push((p.session_id.clone(), p.chunk_number));
                false
            } else {
                true
            }
        });
        for key in &dropped {
            inner.statuses.remove(key);
        }

        let count = before - inner.pending.len();
        if count > 0 {
            warn!(
                "Dropped {} pending chunk(s) of stopped session {}",
                count, session_id
            );
        }
        Ok(count)
    }

    pub async fn capture_failed(&self) -> RecordingState {
        self.apply(RecordingEvent::CaptureFailure)
            .await
            .unwrap_or(RecordingState::Error)
    }

    pub async fn chunk_status(&self, session_id: &str, chunk_number: u32) -> Option<ChunkStatus> {
        let inner = self.inner.lock().await;
        inner
            .statuses
            .get(&(session_id.to_string(), chunk_number))
            .copied()
    }

    /// Chunks waiting for connectivity, oldest first
    pub async fn pending(&self) -> Vec<PendingChunk> {
        self.inner.lock().await.pending.iter().cloned().collect()
    }

    /// Upload and confirm one chunk, parking it if attempts run out
    pub async fn submit(&self, chunk: ReadyChunk) -> ChunkOutcome {
        let key = key_of(&chunk);
        {
            let mut inner = self.inner.lock().await;
            if inner.in_flight.contains(&key) {
                debug!("Chunk {} already in flight", chunk.chunk_number);
                return ChunkOutcome::AlreadyInFlight;
            }
            if inner.statuses.get(&key) == Some(&ChunkStatus::Confirmed) {
                return ChunkOutcome::AlreadyConfirmed;
            }
            inner.pending.retain(|p| (p.session_id.as_str(), p.chunk_number) != (key.0.as_str(), key.1));
            inner.in_flight.insert(key.clone());
            inner.statuses.insert(key, ChunkStatus::Uploading);
        }

        self.deliver(chunk, PendingStage::Upload).await
    }

    /// Retry every parked chunk once under the normal retry policy
    pub async fn retry_pending(&self) -> SweepReport {
        let batch: Vec<PendingChunk> = {
            let mut inner = self.inner.lock().await;
            let queued: Vec<PendingChunk> = inner.pending.drain(..).collect();
            let (runnable, busy): (Vec<_>, Vec<_>) = queued
                .into_iter()
                .partition(|p| !inner.in_flight.contains(&key_of(&p.chunk)));
            inner.pending.extend(busy);
            for p in &runnable {
                inner.in_flight.insert(key_of(&p.chunk));
            }
            runnable
        };

        if batch.is_empty() {
            return SweepReport::default();
        }
        info!("Retrying {} pending chunk(s)", batch.len());

        let mut report = SweepReport::default();
        for pending in batch {
            report.attempted += 1;
            match self.deliver(pending.chunk, pending.stage).await {
                ChunkOutcome::Confirmed => report.confirmed += 1,
                _ => report.still_pending += 1,
            }
        }

        info!(
            "Pending sweep: {} attempted, {} confirmed, {} still pending",
            report.attempted, report.confirmed, report.still_pending
        );
        report
    }

    /// Consume ready chunks, then keep sweeping on connectivity signals until
    /// the pending queue drains or the signal channel closes
    pub async fn run(
        self: Arc<Self>,
        mut chunks: mpsc::Receiver<ReadyChunk>,
        mut signals: mpsc::UnboundedReceiver<SyncSignal>,
    ) {
        let mut chunks_open = true;

        loop {
            if !chunks_open && self.inner.lock().await.pending.is_empty() {
                break;
            }

            tokio::select! {
                chunk = chunks.recv(), if chunks_open => match chunk {
                    Some(chunk) => {
                        self.submit(chunk).await;
                    }
                    None => chunks_open = false,
                },
                signal = signals.recv() => match signal {
                    Some(SyncSignal::ConnectivityRestored) => {
                        info!("Connectivity restored, sweeping pending uploads");
                        self.retry_pending().await;
                    }
                    None => {
                        if !chunks_open {
                            break;
                        }
                        // No more sweeps possible; drain the chunk channel only
                        while let Some(chunk) = chunks.recv().await {
                            self.submit(chunk).await;
                        }
                        break;
                    }
                },
            }
        }

        debug!("Upload coordinator loop finished");
    }

    /// Runs the chunk from `stage` onward; the caller has marked it in flight
    async fn deliver(&self, chunk: ReadyChunk, stage: PendingStage) -> ChunkOutcome {
        let key = key_of(&chunk);

        if stage == PendingStage::Upload {
            let transport = Arc::clone(&self.transport);
            let upload = self
                .with_retry("upload", || {
                    let transport = Arc::clone(&transport);
                    let chunk = chunk.clone();
                    async move {
                        transport
                            .upload_chunk(&chunk.session_id, chunk.chunk_number, &chunk.path)
                            .await
                    }
                })
                .await;

            match upload {
                Ok(response) => {
                    debug!("Server: {}", response.message);
                    self.set_status(&key, ChunkStatus::Uploaded).await;
                }
                Err(e) => return self.park(chunk, PendingStage::Upload, e).await,
            }
        }

        let checksum = file_checksum(&chunk).await;
        let transport = Arc::clone(&self.transport);
        let confirm = self
            .with_retry("confirm", || {
                let transport = Arc::clone(&transport);
                let checksum = checksum.clone();
                let session_id = chunk.session_id.clone();
                let chunk_number = chunk.chunk_number;
                async move {
                    transport
                        .confirm_chunk(&session_id, chunk_number, checksum)
                        .await
                }
            })
            .await;

        match confirm {
            Ok(_) => {
                let mut inner = self.inner.lock().await;
                inner.in_flight.remove(&key);
                inner.statuses.insert(key, ChunkStatus::Confirmed);
                info!(
                    "Chunk {} of session {} confirmed",
                    chunk.chunk_number, chunk.session_id
                );
                ChunkOutcome::Confirmed
            }
            // The server no longer knows the chunk; send it again next sweep
            Err(e @ TransferError::NotFound(_)) => self.park(chunk, PendingStage::Upload, e).await,
            Err(e) => self.park(chunk, PendingStage::Confirm, e).await,
        }
    }

    async fn set_status(&self, key: &ChunkKey, status: ChunkStatus) {
        self.inner.lock().await.statuses.insert(key.clone(), status);
    }

    async fn park(&self, chunk: ReadyChunk, stage: PendingStage, err: TransferError) -> ChunkOutcome {
        let key = key_of(&chunk);
        let (status, outcome) = match stage {
            PendingStage::Upload => (ChunkStatus::PendingUpload, ChunkOutcome::PendingUpload),
            PendingStage::Confirm => (ChunkStatus::PendingConfirm, ChunkOutcome::PendingConfirm),
        };

        warn!(
            "Chunk {} of session {} pending, will retry on reconnect: {}",
            chunk.chunk_number, chunk.session_id, err
        );

        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&key);
        inner.statuses.insert(key, status);
        inner.pending.push_back(PendingChunk {
            session_id: chunk.session_id.clone(),
            chunk_number: chunk.chunk_number,
            chunk,
            stage,
            last_error: err.to_string(),
        });

        outcome
    }

    /// Run `op` up to the policy's attempt budget, sleeping between attempts.
    /// Errors that cannot succeed on retry end the loop early.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, TransferError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransferError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "{} attempt {}/{} failed: {}",
                        what,
                        attempt + 1,
                        self.policy.max_attempts(),
                        e
                    );

                    if !e.is_retryable() {
                        return Err(e);
                    }
                    match self.policy.delay_after(attempt) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return Err(e),
                    }
                    attempt += 1;
                }
            }
        }
    }
}

/// Hex SHA-256 of the chunk file, when it can still be read
async fn file_checksum(chunk: &ReadyChunk) -> Option<String> {
    match tokio::fs::read(&chunk.path).await {
        Ok(bytes) => Some(format!("{:x}", Sha256::digest(&bytes))),
        Err(e) => {
            warn!("Could not checksum {}: {}", chunk.path.display(), e);
            None
        }
    }
}

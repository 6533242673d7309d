use crate::ledger::Session;
use crate::messages::{
    ConfirmChunkRequest, ConfirmChunkResponse, CreateSessionResponse, FailureResponse,
    HealthResponse, ListSessionsResponse, UploadChunkResponse, UploadTargetRequest,
    UploadTargetResponse, AUDIO_FIELD,
};
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Failure of a single request against the ledger server.
///
/// Nothing below the coordinator retries; it only classifies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("failed to read chunk file: {0}")]
    File(String),
}

impl TransferError {
    /// Returns `true` for failures that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Self::NotFound(_) | Self::Decode(_) | Self::File(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type TransferResult<T> = Result<T, TransferError>;

/// Network boundary of the client.
///
/// `UploadCoordinator` only talks to the server through this trait, so tests
/// can inject a scripted transport.
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    async fn create_session(&self) -> TransferResult<String>;

    async fn upload_target(
        &self,
        session_id: &str,
        chunk_number: u32,
    ) -> TransferResult<UploadTargetResponse>;

    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        file: &Path,
    ) -> TransferResult<UploadChunkResponse>;

    async fn confirm_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        checksum: Option<String>,
    ) -> TransferResult<ConfirmChunkResponse>;

    async fn list_sessions(&self) -> TransferResult<Vec<Session>>;

    async fn health(&self) -> TransferResult<HealthResponse>;
}

/// Stateless reqwest wrapper over the ledger HTTP API
#[derive(Debug, Clone)]
pub struct TransferClient {
    http: Client,
    base_url: String,
}

impl TransferClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TransferResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Map non-2xx responses onto `TransferError` and decode the rest
    async fn decode<T: DeserializeOwned>(response: Response) -> TransferResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<FailureResponse>(&body)
            .map(|f| f.error)
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            Err(TransferError::NotFound(message))
        } else {
            Err(TransferError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl ChunkTransport for TransferClient {
    async fn create_session(&self) -> TransferResult<String> {
        let response = self.http.post(self.url("/upload-session")).send().await?;
        let body: CreateSessionResponse = Self::decode(response).await?;

        debug!("Server created session {}", body.session_id);
        Ok(body.session_id)
    }

    async fn upload_target(
        &self,
        session_id: &str,
        chunk_number: u32,
    ) -> TransferResult<UploadTargetResponse> {
        let response = self
            .http
            .post(self.url("/get-presigned-url"))
            .json(&UploadTargetRequest {
                session_id: Some(session_id.to_string()),
                chunk_number: Some(chunk_number),
            })
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn upload_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        file: &Path,
    ) -> TransferResult<UploadChunkResponse> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| TransferError::File(format!("{}: {}", file.display(), e)))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("chunk_{}.wav", chunk_number));

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")?;
        let form = multipart::Form::new().part(AUDIO_FIELD, part);

        let response = self
            .http
            .post(self.url(&format!("/upload-chunk/{}/{}", session_id, chunk_number)))
            .multipart(form)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn confirm_chunk(
        &self,
        session_id: &str,
        chunk_number: u32,
        checksum: Option<String>,
    ) -> TransferResult<ConfirmChunkResponse> {
        let response = self
            .http
            .post(self.url("/notify-chunk-uploaded"))
            .json(&ConfirmChunkRequest {
                session_id: Some(session_id.to_string()),
                chunk_number: Some(chunk_number),
                checksum,
            })
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn list_sessions(&self) -> TransferResult<Vec<Session>> {
        let response = self.http.get(self.url("/all-session")).send().await?;
        let body: ListSessionsResponse = Self::decode(response).await?;
        Ok(body.sessions)
    }

    async fn health(&self) -> TransferResult<HealthResponse> {
        let response = self.http.get(self.url("/health")).send().await?;
        Self::decode(response).await
    }
}

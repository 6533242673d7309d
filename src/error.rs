use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use crate::messages::FailureResponse;

/// Errors raised by the session ledger.
///
/// Re-uploading a chunk number that is already recorded is not an error; the
/// ledger returns the existing record instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("Session {0} not found")]
    SessionNotFound(String),

    #[error("Chunk {chunk_number} not found in session {session_id}")]
    ChunkNotFound {
        session_id: String,
        chunk_number: u32,
    },

    #[error("No free session ids left")]
    IdSpaceExhausted,

    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::SessionNotFound(_) | Self::ChunkNotFound { .. } => StatusCode::NOT_FOUND,
            Self::IdSpaceExhausted => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (
            status,
            Json(FailureResponse {
                success: false,
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors from the client-side preference store
#[derive(Debug, thiserror::Error)]
pub enum DurabilityError {
    #[error("preference store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("preference store format: {0}")]
    Format(#[from] serde_json::Error),
}

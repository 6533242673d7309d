use super::state::AppState;
use crate::error::LedgerError;
use crate::messages::{
    ConfirmChunkRequest, ConfirmChunkResponse, CreateSessionResponse, HealthResponse,
    ListSessionsResponse, UploadChunkResponse, UploadTargetRequest, UploadTargetResponse,
    AUDIO_FIELD,
};
use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::PathRejection,
        Multipart, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use tracing::info;

type HandlerResult = Result<Response, LedgerError>;

fn require<T>(value: Option<T>, message: &str) -> Result<T, LedgerError> {
    value.ok_or_else(|| LedgerError::validation(message))
}

/// POST /upload-session
/// Create a new upload session
pub async fn create_session(State(state): State<AppState>) -> HandlerResult {
    let session = state.store.create_session().await?;

    Ok((
        StatusCode::OK,
        Json(CreateSessionResponse {
            success: true,
            session_id: session.id.clone(),
            message: format!("Upload session {} created", session.id),
        }),
    )
        .into_response())
}

/// POST /get-presigned-url
/// Hand out the upload target for one chunk
pub async fn get_upload_target(
    State(state): State<AppState>,
    body: Option<Json<UploadTargetRequest>>,
) -> HandlerResult {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let (session_id, chunk_number) = match (req.session_id, req.chunk_number) {
        (Some(s), Some(n)) => (s, n),
        _ => {
            return Err(LedgerError::validation(
                "sessionId and chunkNumber are required",
            ))
        }
    };

    state.store.lookup(&session_id).await?;

    Ok((
        StatusCode::OK,
        Json(UploadTargetResponse {
            success: true,
            presigned_url: state.upload_target(&session_id, chunk_number),
            session_id,
            chunk_number,
            expires_in: state.presign_expires_secs,
        }),
    )
        .into_response())
}

/// POST /upload-chunk/:session_id/:chunk_number
/// Store one chunk (multipart field `audio`); repeats return the stored record
pub async fn upload_chunk(
    State(state): State<AppState>,
    path: Result<Path<(String, u32)>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> HandlerResult {
    let Path((session_id, chunk_number)) =
        path.map_err(|e| LedgerError::validation(e.body_text()))?;
    state.store.lookup(&session_id).await?;

    let mut multipart = multipart.map_err(|e| LedgerError::validation(e.body_text()))?;

    let mut audio = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| LedgerError::validation(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some(AUDIO_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| LedgerError::validation(format!("Failed to read audio: {}", e)))?;
            audio = Some(bytes);
            break;
        }
    }
    let audio = require(audio, "No audio file uploaded")?;

    // Written under the session lock; a repeat keeps the stored bytes
    let outcome = state
        .store
        .store_chunk(&session_id, chunk_number, &audio, &state.blobs)
        .await?;

    let message = if outcome.created {
        format!("Chunk {} uploaded", chunk_number)
    } else {
        info!(
            "Chunk {} of session {} already uploaded, skipped",
            chunk_number, session_id
        );
        format!("Chunk {} already uploaded, skipped", chunk_number)
    };

    Ok((
        StatusCode::OK,
        Json(UploadChunkResponse {
            success: true,
            session_id,
            chunk_number,
            filename: outcome.chunk.filename,
            size: outcome.chunk.size,
            message,
            created: outcome.created,
        }),
    )
        .into_response())
}

/// POST /notify-chunk-uploaded
/// Mark an uploaded chunk as confirmed
pub async fn confirm_chunk(
    State(state): State<AppState>,
    body: Option<Json<ConfirmChunkRequest>>,
) -> HandlerResult {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let session_id = require(req.session_id, "sessionId and chunkNumber are required")?;
    let chunk_number = require(req.chunk_number, "sessionId and chunkNumber are required")?;

    let chunk = state
        .store
        .confirm_chunk(&session_id, chunk_number, req.checksum)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ConfirmChunkResponse {
            success: true,
            session_id,
            chunk_number,
            confirmed: chunk.confirmed,
            message: format!("Chunk {} confirmed", chunk_number),
        }),
    )
        .into_response())
}

/// GET /all-session
/// List every session with its chunks
pub async fn list_sessions(State(state): State<AppState>) -> HandlerResult {
    let sessions = state.store.list_sessions().await?;

    Ok((
        StatusCode::OK,
        Json(ListSessionsResponse {
            success: true,
            total_sessions: sessions.len(),
            sessions,
        }),
    )
        .into_response())
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> HandlerResult {
    let sessions = state.store.list_sessions().await?;

    Ok((
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            total_sessions: sessions.len(),
        }),
    )
        .into_response())
}

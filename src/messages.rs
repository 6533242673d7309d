use crate::ledger::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multipart field carrying chunk bytes on `POST /upload-chunk/:id/:n`
pub const AUDIO_FIELD: &str = "audio";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
}

/// Body of `POST /get-presigned-url`; fields are optional so a missing one
/// can be reported as a 400 instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetRequest {
    pub session_id: Option<String>,
    pub chunk_number: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTargetResponse {
    pub success: bool,
    pub presigned_url: String,
    pub session_id: String,
    pub chunk_number: u32,
    /// Seconds the target stays valid
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub success: bool,
    pub session_id: String,
    pub chunk_number: u32,
    pub filename: String,
    pub size: u64,
    pub message: String,
    /// False when the chunk number was already recorded
    #[serde(default = "default_true")]
    pub created: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmChunkRequest {
    pub session_id: Option<String>,
    pub chunk_number: Option<u32>,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmChunkResponse {
    pub success: bool,
    pub session_id: String,
    pub chunk_number: u32,
    pub confirmed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsResponse {
    pub success: bool,
    pub sessions: Vec<Session>,
    pub total_sessions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub total_sessions: usize,
}

/// Body of every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

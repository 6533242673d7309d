// Integration tests for the ledger HTTP surface
//
// These drive the axum router directly with `oneshot` requests and check the
// JSON contract: session creation, upload targets, idempotent chunk upload,
// confirmation and listing.

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chunk_sync::ledger::{BlobStore, InMemoryLedger, SequenceIds, Session};
use chunk_sync::{create_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "chunk-sync-test-boundary";

fn test_app(dir: &TempDir, ids: SequenceIds) -> Router {
    let state = AppState::new(
        Arc::new(InMemoryLedger::with_id_source(ids)),
        BlobStore::new(dir.path().join("uploads")),
        "http://ledger.test",
    );
    create_router(state)
}

fn multipart_body(field: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"rec.wav\"\r\nContent-Type: audio/wav\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(app: &Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, serde_json::from_slice(&bytes)?))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn upload(session_id: &str, chunk_number: u32, field: &str, bytes: &[u8]) -> Request<Body> {
    Request::post(format!("/upload-chunk/{}/{}", session_id, chunk_number))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, bytes)))
        .unwrap()
}

#[tokio::test]
async fn test_full_upload_scenario() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([42]));

    // Create session
    let (status, body) = send(&app, Request::post("/upload-session").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["sessionId"], "test_042");

    // Upload target for chunk 0
    let (status, body) = send(
        &app,
        post_json(
            "/get-presigned-url",
            json!({"sessionId": "test_042", "chunkNumber": 0}),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["presignedUrl"]
        .as_str()
        .unwrap()
        .ends_with("/upload-chunk/test_042/0"));
    assert_eq!(body["chunkNumber"], 0);
    assert_eq!(body["expiresIn"], 3600);

    // Upload chunk 0
    let audio = vec![7u8; 12_345];
    let (status, body) = send(&app, upload("test_042", 0, "audio", &audio)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "chunk_0.wav");
    assert_eq!(body["size"], 12_345);
    let stored = dir.path().join("uploads/test_042/chunk_0.wav");
    assert_eq!(std::fs::read(&stored)?.len(), 12_345);

    // Re-upload is skipped and returns the same record
    let (status, body) = send(&app, upload("test_042", 0, "audio", &[1, 2, 3])).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "chunk_0.wav");
    assert_eq!(body["size"], 12_345);
    assert!(body["message"].as_str().unwrap().contains("skipped"));
    assert_eq!(std::fs::read(&stored)?.len(), 12_345, "Stored bytes must not change");

    // Confirm with checksum
    let (status, body) = send(
        &app,
        post_json(
            "/notify-chunk-uploaded",
            json!({"sessionId": "test_042", "chunkNumber": 0, "checksum": "abc123"}),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["confirmed"], true);

    // List
    let (status, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalSessions"], 1);

    let sessions: Vec<Session> = serde_json::from_value(body["sessions"].clone())?;
    let session = &sessions[0];
    assert_eq!(session.id, "test_042");
    assert_eq!(session.total_chunks, 1);
    assert_eq!(session.chunks.len(), 1);

    let chunk = &session.chunks[0];
    assert!(chunk.confirmed);
    assert_eq!(chunk.checksum.as_deref(), Some("abc123"));
    assert!(chunk.confirmed_at.unwrap() >= chunk.uploaded_at);

    Ok(())
}

#[tokio::test]
async fn test_session_ids_match_visible_format() -> Result<()> {
    let dir = TempDir::new()?;
    let app = create_router(AppState::new(
        Arc::new(InMemoryLedger::new()),
        BlobStore::new(dir.path()),
        "http://ledger.test",
    ));

    for _ in 0..20 {
        let (_, body) = send(&app, Request::post("/upload-session").body(Body::empty())?).await?;
        let id = body["sessionId"].as_str().unwrap().to_string();
        assert!(id.starts_with("test_"));
        assert_eq!(id.len(), 8);
        assert!(id[5..].chars().all(|c| c.is_ascii_digit()));
    }

    let (_, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    assert_eq!(body["totalSessions"], 20, "Ids must not collide");
    for session in body["sessions"].as_array().unwrap() {
        assert_eq!(session["totalChunks"], 0);
        assert_eq!(session["chunks"].as_array().unwrap().len(), 0);
        assert_eq!(session["status"], "active");
    }

    Ok(())
}

#[tokio::test]
async fn test_upload_target_validation() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([1]));

    let (status, body) = send(&app, post_json("/get-presigned-url", json!({"sessionId": "test_001"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        Request::post("/get-presigned-url").body(Body::empty())?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        post_json(
            "/get-presigned-url",
            json!({"sessionId": "test_404", "chunkNumber": 0}),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("test_404"));

    Ok(())
}

#[tokio::test]
async fn test_upload_errors() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([5]));

    // Unknown session
    let (status, _) = send(&app, upload("test_999", 0, "audio", b"data")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Known session, but no `audio` field
    send(&app, Request::post("/upload-session").body(Body::empty())?).await?;
    let (status, body) = send(&app, upload("test_005", 0, "other", b"data")).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    assert_eq!(body["sessions"][0]["totalChunks"], 0);

    Ok(())
}

#[tokio::test]
async fn test_confirm_unknown_chunk_is_not_found() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([9]));
    send(&app, Request::post("/upload-session").body(Body::empty())?).await?;

    let (status, _) = send(
        &app,
        post_json(
            "/notify-chunk-uploaded",
            json!({"sessionId": "test_009", "chunkNumber": 4}),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json(
            "/notify-chunk-uploaded",
            json!({"sessionId": "test_777", "chunkNumber": 0}),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        post_json("/notify-chunk-uploaded", json!({"chunkNumber": 0})),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_out_of_order_uploads() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([12]));
    send(&app, Request::post("/upload-session").body(Body::empty())?).await?;

    for n in [3, 1, 0, 3, 2, 1] {
        let (status, _) = send(&app, upload("test_012", n, "audio", &[n as u8; 10])).await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    let session = &body["sessions"][0];
    assert_eq!(session["totalChunks"], 4);
    assert_eq!(session["chunks"].as_array().unwrap().len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([1]));

    let (status, body) = send(&app, Request::get("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["totalSessions"], 0);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_duplicate_uploads_keep_one_file() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([21]));
    send(&app, Request::post("/upload-session").body(Body::empty())?).await?;

    // Same chunk number, different payload sizes, all in flight at once
    let mut handles = Vec::new();
    for i in 1..=8usize {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            send(&app, upload("test_021", 0, "audio", &vec![i as u8; i * 4096])).await
        }));
    }

    let mut created = 0;
    for handle in handles {
        let (status, body) = handle.await??;
        assert_eq!(status, StatusCode::OK);
        if body["created"] == true {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    let (_, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    let recorded = body["sessions"][0]["chunks"][0]["size"].as_u64().unwrap();

    let stored = std::fs::read(BlobStore::new(dir.path().join("uploads")).chunk_path("test_021", 0))?;
    assert_eq!(stored.len() as u64, recorded);
    assert!(stored.iter().all(|b| *b as u64 * 4096 == recorded));

    Ok(())
}

#[tokio::test]
async fn test_bad_upload_requests_use_json_errors() -> Result<()> {
    let dir = TempDir::new()?;
    let app = test_app(&dir, SequenceIds::new([8]));
    send(&app, Request::post("/upload-session").body(Body::empty())?).await?;

    // Chunk number is not a number
    let request = Request::post("/upload-chunk/test_008/abc")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body("audio", b"data")))?;
    let (status, body) = send(&app, request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    // JSON body instead of multipart
    let (status, body) = send(&app, post_json("/upload-chunk/test_008/0", json!({"audio": "x"}))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (_, body) = send(&app, Request::get("/all-session").body(Body::empty())?).await?;
    assert_eq!(body["sessions"][0]["totalChunks"], 0);

    Ok(())
}

use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Upper bound on a single chunk upload body
pub const MAX_CHUNK_BYTES: usize = 256 * 1024 * 1024;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session lifecycle
        .route("/upload-session", post(handlers::create_session))
        .route("/all-session", get(handlers::list_sessions))
        // Chunk transfer
        .route("/get-presigned-url", post(handlers::get_upload_target))
        .route(
            "/upload-chunk/:session_id/:chunk_number",
            post(handlers::upload_chunk),
        )
        .route("/notify-chunk-uploaded", post(handlers::confirm_chunk))
        .layer(DefaultBodyLimit::max(MAX_CHUNK_BYTES))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! API routes for the document QA server

pub mod ask;
pub mod feedback;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ask - with larger body limit for file uploads
        .route(
            "/ask",
            post(ask::ask).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/ask/stream",
            post(ask::ask_stream).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/feedback", post(feedback::submit_feedback))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let orchestrator = state.orchestrator();
    let settings = orchestrator.settings();

    Json(serde_json::json!({
        "name": "docqa",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Upload a PDF or text document and ask questions about it",
        "models": {
            "generation": settings.generate_model,
            "embedding": settings.embed_model,
        },
        "index": {
            "chunk_size": settings.chunk_size,
            "chunk_overlap": settings.chunk_overlap,
            "similarity_top_k": settings.similarity_top_k,
        },
        "max_upload_size": state.config().server.max_upload_size,
        "feedback": state.feedback().snapshot(),
        "endpoints": {
            "GET /": "Upload form",
            "POST /api/ask": "Upload a document and ask a question (multipart: file, question, session_id, temperature, max_tokens)",
            "POST /api/ask/stream": "Same as /api/ask, with progress as server-sent events",
            "POST /api/feedback": "Rate an answer ({request_id, helpful})",
            "GET /api/info": "This document"
        }
    }))
}

//! Answer feedback endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::server::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub request_id: Uuid,
    pub helpful: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub message: &'static str,
}

/// POST /api/feedback - Record a helpful / not-helpful vote
pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Json<FeedbackResponse> {
    state.feedback().record(request.helpful);
    tracing::info!(
        request_id = %request.request_id,
        helpful = request.helpful,
        "Answer feedback received"
    );

    let message = if request.helpful {
        "Thank you for your feedback!"
    } else {
        "Thanks for the feedback. We'll keep improving!"
    };
    Json(FeedbackResponse { message })
}

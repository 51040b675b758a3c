//! Ask endpoints: one upload plus one question per request

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::pipeline::{
    FailureReport, InputWarning, Outcome, PipelineState, RunReport, StatusUpdate, Submission,
};
use crate::server::state::AppState;
use crate::types::{GenerationOptions, SessionKey, SourceFragment, UploadedFile};

/// Source previews shown under an answer
const MAX_SOURCES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskStatus {
    Answered,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningBody {
    pub code: InputWarning,
    pub message: String,
}

/// Response body for both ask endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub request_id: Uuid,
    pub status: AskStatus,
    pub final_state: PipelineState,
    pub progress: Vec<StatusUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceFragment>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<WarningBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureReport>,
    pub elapsed_ms: u64,
}

impl AskResponse {
    pub fn from_report(report: RunReport) -> Self {
        let mut response = Self {
            request_id: report.request_id,
            status: AskStatus::Answered,
            final_state: report.final_state,
            progress: report.progress,
            answer: None,
            sources: None,
            warning: None,
            error: None,
            elapsed_ms: report.elapsed_ms,
        };

        match report.outcome {
            Outcome::Answered(result) => {
                response.answer = Some(result.answer);
                response.sources = Some(result.sources.into_iter().take(MAX_SOURCES).collect());
            }
            Outcome::Warning(code) => {
                response.status = AskStatus::Warning;
                response.warning = Some(WarningBody {
                    code,
                    message: code.message().to_string(),
                });
            }
            Outcome::Failed(failure) => {
                response.status = AskStatus::Error;
                response.error = Some(failure);
            }
        }

        response
    }

    pub fn status_code(&self) -> StatusCode {
        match (&self.status, &self.error) {
            (AskStatus::Answered, _) => StatusCode::OK,
            (AskStatus::Warning, _) => StatusCode::UNPROCESSABLE_ENTITY,
            (AskStatus::Error, Some(failure)) => {
                StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            (AskStatus::Error, None) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AskResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Read the form fields into a submission. Unknown fields are ignored and
/// unparseable slider values fall back to their defaults. A body over the
/// upload limit fails with [`Error::Upload`] carrying 413.
async fn read_submission(mut multipart: Multipart) -> Result<Submission> {
    let mut file = None;
    let mut question = String::new();
    let mut session = SessionKey::default();
    let mut options = GenerationOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;

                // Browsers send an empty, nameless part when no file was picked
                if filename.is_empty() && data.is_empty() {
                    continue;
                }
                let filename = if filename.is_empty() {
                    format!("upload_{}.txt", Uuid::new_v4().simple())
                } else {
                    filename
                };
                file = Some(UploadedFile::new(filename, data, content_type));
            }
            "question" => question = read_text(field).await?,
            "session_id" => session = SessionKey::new(&read_text(field).await?),
            "temperature" => {
                if let Ok(value) = read_text(field).await?.trim().parse::<f32>() {
                    options.temperature = value;
                }
            }
            "max_tokens" => {
                if let Ok(value) = read_text(field).await?.trim().parse::<u32>() {
                    options.max_output_tokens = value;
                }
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(Submission::new(file, question)
        .with_options(options.clamped())
        .with_session(session))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    Ok(field.text().await?)
}

/// POST /api/ask - Run the pipeline and return the final report
pub async fn ask(State(state): State<AppState>, multipart: Multipart) -> Result<AskResponse> {
    let submission = read_submission(multipart).await?;

    // Dropping the handler (client gone) cancels the pipeline task
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let orchestrator = state.orchestrator();
    let report = tokio::spawn(async move { orchestrator.run(submission, None, cancel).await })
        .await
        .map_err(|e| Error::internal(format!("Pipeline task failed: {}", e)))?;

    Ok(AskResponse::from_report(report))
}

/// POST /api/ask/stream - Same as `ask`, streaming status updates as SSE.
///
/// Emits one `status` event per transition and a final `result` event
/// carrying the [`AskResponse`].
pub async fn ask_stream(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let submission = read_submission(multipart).await?;

    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();
    let (tx, rx) = mpsc::unbounded_channel::<StatusUpdate>();

    let orchestrator = state.orchestrator();
    let task = tokio::spawn(async move { orchestrator.run(submission, Some(tx), cancel).await });

    let status_events = UnboundedReceiverStream::new(rx).map(|update| {
        Ok::<_, Infallible>(
            Event::default()
                .event("status")
                .data(serde_json::to_string(&update).unwrap_or_default()),
        )
    });

    let result_event = stream::once(async move {
        // Held until the stream finishes or is dropped with the connection
        let _guard = guard;
        let event = match task.await {
            Ok(report) => {
                let response = AskResponse::from_report(report);
                Event::default()
                    .event("result")
                    .data(serde_json::to_string(&response).unwrap_or_default())
            }
            Err(e) => {
                tracing::error!("Pipeline task failed: {}", e);
                Event::default()
                    .event("error")
                    .data(format!("Pipeline task failed: {}", e))
            }
        };
        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(status_events.chain(result_event)).keep_alive(KeepAlive::default()))
}

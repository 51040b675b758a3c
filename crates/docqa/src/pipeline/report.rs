//! Submission, status and outcome types for one pipeline run

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, ErrorKind};
use crate::types::{GenerationOptions, QueryResult, SessionKey, UploadedFile};

/// Guidance shown with every failure
pub const TROUBLESHOOTING: [&str; 5] = [
    "Check your document: Make sure it's readable and not corrupted",
    "Verify API key: Ensure your Google API key is correctly configured",
    "Try smaller files: Large documents may cause processing issues",
    "Simplify your question: Try asking a more specific question",
    "Refresh and retry: Sometimes a simple refresh helps",
];

/// One user action: a document and a question about it
#[derive(Debug, Clone)]
pub struct Submission {
    pub file: Option<UploadedFile>,
    pub question: String,
    pub options: GenerationOptions,
    pub session: SessionKey,
}

impl Submission {
    pub fn new(file: Option<UploadedFile>, question: impl Into<String>) -> Self {
        Self {
            file,
            question: question.into(),
            options: GenerationOptions::default(),
            session: SessionKey::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_session(mut self, session: SessionKey) -> Self {
        self.session = session;
        self
    }

    /// The upload to process, or the warning that keeps the run idle
    pub fn validate(&self) -> Result<&UploadedFile, InputWarning> {
        let file = self.file.as_ref().ok_or(InputWarning::MissingDocument)?;
        if self.question.trim().is_empty() {
            return Err(InputWarning::BlankQuestion);
        }
        Ok(file)
    }
}

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Loading,
    ModelReady,
    Indexed,
    Answered,
    Error,
}

/// Progress report emitted on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub state: PipelineState,
    pub message: String,
    /// Percent complete (0-100)
    pub progress: u8,
}

/// User-input problems; reported as warnings, never as errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputWarning {
    MissingDocument,
    BlankQuestion,
}

impl InputWarning {
    pub fn message(&self) -> &'static str {
        match self {
            Self::MissingDocument => "Please upload a document first.",
            Self::BlankQuestion => "Please enter a question.",
        }
    }
}

impl std::fmt::Display for InputWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// What the user sees when a run fails
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    /// HTTP status the failure maps to
    pub status: u16,
    /// Error text including every wrapped cause
    pub message: String,
    pub troubleshooting: Vec<String>,
}

impl FailureReport {
    pub fn from_error(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            status: err.status_code().as_u16(),
            message: err.detail(),
            troubleshooting: TROUBLESHOOTING.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Warning(InputWarning),
    Answered(QueryResult),
    Failed(FailureReport),
}

/// Everything a caller needs to render one run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub request_id: Uuid,
    pub final_state: PipelineState,
    pub progress: Vec<StatusUpdate>,
    pub outcome: Outcome,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn answer(&self) -> Option<&QueryResult> {
        match &self.outcome {
            Outcome::Answered(result) => Some(result),
            _ => None,
        }
    }

    pub fn warning(&self) -> Option<InputWarning> {
        match &self.outcome {
            Outcome::Warning(w) => Some(*w),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReport> {
        match &self.outcome {
            Outcome::Failed(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload() -> UploadedFile {
        UploadedFile::new("notes.txt", b"text".to_vec(), None)
    }

    #[test]
    fn test_validate_missing_document_first() {
        let submission = Submission::new(None, "   ");
        assert_eq!(submission.validate().unwrap_err(), InputWarning::MissingDocument);
        assert_eq!(
            InputWarning::MissingDocument.to_string(),
            "Please upload a document first."
        );
    }

    #[test]
    fn test_validate_blank_question() {
        for question in ["", "  ", "\n\t"] {
            let submission = Submission::new(Some(upload()), question);
            assert_eq!(submission.validate().unwrap_err(), InputWarning::BlankQuestion);
        }
        assert!(Submission::new(Some(upload()), "Why?").validate().is_ok());
    }

    #[test]
    fn test_failure_report_carries_tips() {
        let report = FailureReport::from_error(&Error::Config("GOOGLE_API_KEY is not set".into()));
        assert_eq!(report.kind, ErrorKind::Configuration);
        assert_eq!(report.status, 503);
        assert_eq!(report.troubleshooting.len(), 5);
        assert!(report.message.contains("GOOGLE_API_KEY"));
    }
}

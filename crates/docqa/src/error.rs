//! Error types for the document QA service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result type alias for document QA operations
pub type Result<T> = std::result::Result<T, Error>;

/// Document QA errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing credential, failed handshake, bad settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unsupported file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Upload could not be staged or parsed
    #[error("Failed to load document '{filename}': {source}")]
    Ingestion {
        filename: String,
        #[source]
        source: Box<Error>,
    },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Generation error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Index could not be built or persisted
    #[error("Failed to build vector index: {source}")]
    IndexBuild {
        #[source]
        source: Box<Error>,
    },

    /// Query could not be answered
    #[error("Failed to answer question: {source}")]
    Query {
        #[source]
        source: Box<Error>,
    },

    /// Vector index snapshot error
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Multipart body could not be read (malformed, or over the upload limit)
    #[error("Invalid upload: {0}")]
    Upload(#[from] axum::extract::multipart::MultipartError),

    /// The request was abandoned before it finished
    #[error("Request cancelled")]
    Cancelled,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classes shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or rejected credential, invalid settings
    Configuration,
    /// Unreadable or unparseable upload
    Ingestion,
    /// Embedding or generation call failed
    RemoteService,
    /// Client went away mid-request
    Cancelled,
    /// Anything else
    Internal,
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Wrap a loader failure with the name of the upload
    pub fn ingestion(filename: impl Into<String>, source: Error) -> Self {
        Self::Ingestion {
            filename: filename.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an embedding or persistence failure
    pub fn index_build(source: Error) -> Self {
        match source {
            already @ Error::IndexBuild { .. } => already,
            Error::Cancelled => Error::Cancelled,
            other => Self::IndexBuild {
                source: Box::new(other),
            },
        }
    }

    /// Wrap a retrieval or generation failure
    pub fn query(source: Error) -> Self {
        match source {
            already @ Error::Query { .. } => already,
            Error::Cancelled => Error::Cancelled,
            other => Self::Query {
                source: Box::new(other),
            },
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify the error, looking through wrappers to the originating cause
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Configuration,
            Error::UnsupportedFileType(_)
            | Error::FileParse { .. }
            | Error::Ingestion { .. }
            | Error::Upload(_) => ErrorKind::Ingestion,
            Error::IndexBuild { source } | Error::Query { source } => source.kind(),
            Error::Embedding(_) | Error::Llm(_) => ErrorKind::RemoteService,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::VectorIndex(_) | Error::Io(_) | Error::Json(_) | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Full message including every wrapped cause
    pub fn detail(&self) -> String {
        let mut message = self.to_string();
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(cause) = current {
            let text = cause.to_string();
            if !message.contains(&text) {
                message.push_str(&format!("\n  caused by: {}", text));
            }
            current = cause.source();
        }
        message
    }

    /// HTTP status used when the error leaves the server
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::UnsupportedFileType(_) | Error::FileParse { .. } | Error::Ingestion { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::Upload(e) => e.status(),
            Error::Embedding(_) | Error::Llm(_) => StatusCode::BAD_GATEWAY,
            Error::IndexBuild { source } | Error::Query { source } => source.status_code(),
            Error::Json(_) => StatusCode::BAD_REQUEST,
            // 499: client closed request
            Error::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
            }
            Error::VectorIndex(_) | Error::Io(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::UnsupportedFileType(_) => "unsupported_type",
            Error::FileParse { .. } => "parse_error",
            Error::Ingestion { .. } => "ingestion_error",
            Error::Embedding(_) => "embedding_error",
            Error::Llm(_) => "llm_error",
            Error::IndexBuild { .. } => "index_build_error",
            Error::Query { .. } => "query_error",
            Error::VectorIndex(_) => "vector_index_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Upload(_) => "upload_error",
            Error::Cancelled => "cancelled",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "type": self.type_name(),
                "kind": self.kind(),
                "message": self.detail(),
            }
        }));

        (self.status_code(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_wrappers() {
        let err = Error::index_build(Error::embedding("quota exceeded"));
        assert_eq!(err.kind(), ErrorKind::RemoteService);
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = Error::index_build(Error::Io(std::io::Error::other("disk full")));
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err = Error::ingestion("notes.txt", Error::file_parse("notes.txt", "empty"));
        assert_eq!(err.kind(), ErrorKind::Ingestion);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_wrapped_status_follows_cause() {
        let err = Error::index_build(Error::Config("chunk_overlap (10) must be smaller".into()));
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = Error::index_build(Error::Io(std::io::Error::other("disk full")));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = Error::query(Error::llm("quota exceeded"));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_wrapping_is_not_nested_twice() {
        let once = Error::query(Error::llm("timeout"));
        let twice = Error::query(once);
        match twice {
            Error::Query { source } => assert!(matches!(*source, Error::Llm(_))),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(Error::index_build(Error::Cancelled), Error::Cancelled));
    }

    #[test]
    fn test_detail_carries_cause() {
        let err = Error::ingestion("scan.pdf", Error::file_parse("scan.pdf", "no text layer"));
        let detail = err.detail();
        assert!(detail.contains("scan.pdf"));
        assert!(detail.contains("no text layer"));
    }
}

//! docqa: ask questions about an uploaded PDF or text document
//!
//! One request runs the whole pipeline: the upload is staged and parsed,
//! the Gemini models are bound after a credential handshake, the text is
//! chunked and embedded into a fresh vector index (persisted per session),
//! and the question is answered from the most similar fragments.

pub mod config;
pub mod error;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod query;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{Orchestrator, PipelineState, RunReport, Submission};
pub use types::{
    document::{Chunk, ChunkSource, FileType, UploadedFile},
    query::{GenerationOptions, SessionKey},
    response::{QueryResult, SourceFragment},
};

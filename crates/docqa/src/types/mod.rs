//! Core types for the document QA service

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, FileType, UploadedFile};
pub use query::{GenerationOptions, SessionKey};
pub use response::{QueryResult, SourceFragment};

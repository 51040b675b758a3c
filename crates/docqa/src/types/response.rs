//! Answer types returned to the UI

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::{Chunk, ChunkSource};

/// Characters kept in a source preview
pub const PREVIEW_CHARS: usize = 300;

/// A retrieved text fragment that supported an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFragment {
    /// Chunk ID
    pub chunk_id: Uuid,
    /// Full chunk text
    pub text: String,
    /// Text cut to [`PREVIEW_CHARS`] characters for display
    pub preview: String,
    /// Where the text came from
    pub metadata: ChunkSource,
    /// Chunk index within its document
    pub chunk_index: u32,
    /// Cosine similarity to the question
    pub score: f32,
}

impl SourceFragment {
    /// Create a fragment from a retrieved chunk
    pub fn from_chunk(chunk: &Chunk, score: f32) -> Self {
        Self {
            chunk_id: chunk.id,
            text: chunk.content.clone(),
            preview: preview(&chunk.content, PREVIEW_CHARS),
            metadata: chunk.source.clone(),
            chunk_index: chunk.chunk_index,
            score,
        }
    }
}

/// Generated answer plus the fragments that supported it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Generated answer
    pub answer: String,
    /// Supporting fragments, most similar first
    pub sources: Vec<SourceFragment>,
}

/// Cut text to `max_chars` characters, appending `...` when anything was dropped
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

//! Retrieval plus generation over a built index

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::prompt::PromptBuilder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::providers::ModelHandle;
use crate::types::{GenerationOptions, QueryResult, SourceFragment};

/// Answers questions against one index with one model
pub struct QueryEngine {
    model: ModelHandle,
    index: Arc<VectorIndex>,
    similarity_top_k: usize,
    snapshot_path: PathBuf,
}

impl QueryEngine {
    pub fn new(
        model: ModelHandle,
        index: Arc<VectorIndex>,
        similarity_top_k: usize,
        snapshot_path: PathBuf,
    ) -> Self {
        Self {
            model,
            index,
            similarity_top_k,
            snapshot_path,
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Where the index backing this engine was persisted
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Answer a question. The question is passed through as given.
    pub async fn query(&self, question: &str, options: &GenerationOptions) -> Result<QueryResult> {
        self.answer(question, options).await.map_err(Error::query)
    }

    async fn answer(&self, question: &str, options: &GenerationOptions) -> Result<QueryResult> {
        let query_vector = self.model.embedder.embed_query(question).await?;
        let hits = self.index.search(&query_vector, self.similarity_top_k)?;

        tracing::debug!(
            "Retrieved {} of {} chunks (top score {:.3})",
            hits.len(),
            self.index.len(),
            hits.first().map(|h| h.score).unwrap_or(0.0)
        );

        let context = PromptBuilder::build_context(&hits);
        let prompt = PromptBuilder::build_qa_prompt(question, &context);
        let answer = self.model.llm.generate(&prompt, &options.clamped()).await?;

        let sources = hits
            .iter()
            .map(|h| SourceFragment::from_chunk(h.chunk, h.score))
            .collect();

        Ok(QueryResult {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

//! Chunk, embed and persist uploaded documents into a queryable index

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::vector_index::VectorIndex;
use crate::config::{GeminiConfig, IndexConfig};
use crate::error::{Error, Result};
use crate::ingestion::{ParsedDocument, TextChunker};
use crate::providers::ModelHandle;
use crate::query::QueryEngine;
use crate::types::SessionKey;

/// Settings for one index build, passed explicitly with every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub embed_model: String,
    pub generate_model: String,
    /// Chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,
    /// Fragments retrieved per question
    pub similarity_top_k: usize,
}

impl IndexSettings {
    pub fn from_config(index: &IndexConfig, gemini: &GeminiConfig) -> Self {
        Self {
            embed_model: gemini.embed_model.clone(),
            generate_model: gemini.generate_model.clone(),
            chunk_size: index.chunk_size,
            chunk_overlap: index.chunk_overlap,
            similarity_top_k: index.similarity_top_k,
        }
    }

    pub fn chunker(&self) -> Result<TextChunker> {
        TextChunker::new(self.chunk_size, self.chunk_overlap)
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default(), &GeminiConfig::default())
    }
}

/// Builds a fresh index per request and keeps one snapshot per session on disk
pub struct IndexBuilder {
    index_root: PathBuf,
    locks: DashMap<SessionKey, Arc<Mutex<()>>>,
}

impl IndexBuilder {
    pub fn new(index_root: impl Into<PathBuf>) -> Self {
        Self {
            index_root: index_root.into(),
            locks: DashMap::new(),
        }
    }

    /// Snapshot directory for a session
    pub fn session_dir(&self, session: &SessionKey) -> PathBuf {
        self.index_root.join(session.as_str())
    }

    /// Chunk and embed `documents`, persist the index for `session` and
    /// return an engine over it
    pub async fn build(
        &self,
        model: &ModelHandle,
        documents: Vec<ParsedDocument>,
        settings: &IndexSettings,
        session: &SessionKey,
    ) -> Result<QueryEngine> {
        self.build_inner(model, documents, settings, session)
            .await
            .map_err(Error::index_build)
    }

    async fn build_inner(
        &self,
        model: &ModelHandle,
        documents: Vec<ParsedDocument>,
        settings: &IndexSettings,
        session: &SessionKey,
    ) -> Result<QueryEngine> {
        let chunker = settings.chunker()?;
        let chunks: Vec<_> = documents
            .iter()
            .flat_map(|doc| chunker.chunk_document(doc))
            .collect();

        if chunks.is_empty() {
            return Err(Error::VectorIndex("No text chunks to index".to_string()));
        }

        tracing::info!(
            "Embedding {} chunks from {} document(s) with {}",
            chunks.len(),
            documents.len(),
            model.embedder.name()
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = model.embedder.embed_batch(&texts).await?;

        if vectors.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        if dimensions == 0 || vectors.iter().any(|v| v.len() != dimensions) {
            return Err(Error::embedding("Embeddings have inconsistent dimensions"));
        }
        if dimensions != model.embedder.dimensions() {
            tracing::warn!(
                "{} declared {} dimensions but returned {}",
                model.embedder.name(),
                model.embedder.dimensions(),
                dimensions
            );
        }

        let mut index = VectorIndex::new(settings.embed_model.clone(), dimensions);
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(chunk, vector)?;
        }
        let index = Arc::new(index);

        let snapshot_path = self.persist(&index, session).await?;
        tracing::info!(
            "Indexed {} chunks for session {} at {}",
            index.len(),
            session,
            snapshot_path.display()
        );

        Ok(QueryEngine::new(
            model.clone(),
            index,
            settings.similarity_top_k,
            snapshot_path,
        ))
    }

    /// Persist under the session lock so concurrent builds for one session
    /// cannot interleave their directory swaps
    async fn persist(&self, index: &Arc<VectorIndex>, session: &SessionKey) -> Result<PathBuf> {
        let lock = self.locks.entry(session.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock().await;
            let dir = self.session_dir(session);
            let index = Arc::clone(index);
            tokio::task::spawn_blocking(move || index.persist(&dir))
                .await
                .map_err(|e| Error::internal(format!("Persist task failed: {}", e)))
        };

        // Forget the lock once no other build of this session holds or awaits it
        drop(lock);
        self.locks.remove_if(session, |_, held| Arc::strong_count(held) == 1);

        result?
    }
}

//! Provider abstractions for embeddings and generation
//!
//! The pipeline only sees the traits; `gemini` is the production backend and
//! tests plug in deterministic fakes through [`ModelLoader`].

pub mod embedding;
pub mod gemini;
pub mod llm;

use async_trait::async_trait;
use std::sync::Arc;

pub use embedding::EmbeddingProvider;
pub use gemini::{GeminiClient, GeminiEmbedder, GeminiModelLoader};
pub use llm::LlmProvider;

/// A ready generative model plus the embedding model bound to the same credential
#[derive(Clone)]
pub struct ModelHandle {
    pub llm: Arc<dyn LlmProvider>,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl ModelHandle {
    pub fn new(llm: Arc<dyn LlmProvider>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { llm, embedder }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("llm", &self.llm.model())
            .field("embedder", &self.embedder.name())
            .finish()
    }
}

/// Produces a [`ModelHandle`], verifying the credential on the way
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Validate the credential and bind the models
    async fn load(&self) -> crate::error::Result<ModelHandle>;
}

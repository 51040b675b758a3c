//! Deterministic providers for pipeline and router tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use docqa::config::AppConfig;
use docqa::error::{Error, Result};
use docqa::providers::{EmbeddingProvider, LlmProvider, ModelHandle, ModelLoader};
use docqa::GenerationOptions;

pub const DIMENSIONS: usize = 64;

/// Bag-of-words embedder: each lowercase token is hashed into one of 64 buckets
#[derive(Default)]
pub struct HashingEmbedder {
    pub document_texts: AtomicUsize,
    pub queries: AtomicUsize,
}

impl HashingEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in token.to_lowercase().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % DIMENSIONS as u64) as usize] += 1.0;
        }
        v
    }

    pub fn calls(&self) -> usize {
        self.document_texts.load(Ordering::SeqCst) + self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.document_texts.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Answers with the first line of retrieved context
#[derive(Default)]
pub struct ExtractiveLlm {
    pub calls: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl LlmProvider for ExtractiveLlm {
    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::llm("Gemini generation failed (429): quota exceeded"));
        }
        let context = prompt.split("---------------------\n").nth(1).unwrap_or("");
        Ok(context
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('['))
            .unwrap_or("I don't know.")
            .to_string())
    }

    fn name(&self) -> &str {
        "extractive"
    }

    fn model(&self) -> &str {
        "extractive-1"
    }
}

/// Model loader handing out the fakes above, or failing the handshake
pub struct FakeModelLoader {
    pub embedder: Arc<HashingEmbedder>,
    pub llm: Arc<ExtractiveLlm>,
    pub reject: bool,
    pub loads: AtomicUsize,
}

impl FakeModelLoader {
    pub fn new() -> Arc<Self> {
        Self::build(false, false)
    }

    pub fn rejecting() -> Arc<Self> {
        Self::build(true, false)
    }

    pub fn with_failing_llm() -> Arc<Self> {
        Self::build(false, true)
    }

    fn build(reject: bool, llm_fails: bool) -> Arc<Self> {
        Arc::new(Self {
            embedder: Arc::new(HashingEmbedder::default()),
            llm: Arc::new(ExtractiveLlm {
                calls: AtomicUsize::new(0),
                fail: llm_fails,
            }),
            reject,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn llm_calls(&self) -> usize {
        self.llm.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for FakeModelLoader {
    async fn load(&self) -> Result<ModelHandle> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(Error::Config(
                "Gemini rejected the model handshake for 'gemini-1.5-flash' (400 Bad Request): API key not valid"
                    .to_string(),
            ));
        }
        Ok(ModelHandle::new(self.llm.clone(), self.embedder.clone()))
    }
}

/// Config with scratch and index directories under `root`
pub fn test_config(root: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.gemini.api_key = Some("test-key".to_string());
    config.storage.scratch_dir = root.join("temp_data");
    config.storage.index_root = root.join("storage");
    config.logging.file = None;
    config
}

/// Number of entries directly under `dir` (0 if it does not exist)
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

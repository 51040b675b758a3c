//! Application state for the document QA server

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::pipeline::Orchestrator;
use crate::providers::{GeminiModelLoader, ModelLoader};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    orchestrator: Arc<Orchestrator>,
    feedback: FeedbackCounters,
    ready: RwLock<bool>,
}

/// Helpful / not-helpful votes since start-up
#[derive(Debug, Default)]
pub struct FeedbackCounters {
    helpful: AtomicU64,
    not_helpful: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeedbackSnapshot {
    pub helpful: u64,
    pub not_helpful: u64,
}

impl FeedbackCounters {
    pub fn record(&self, helpful: bool) {
        let counter = if helpful {
            &self.helpful
        } else {
            &self.not_helpful
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FeedbackSnapshot {
        FeedbackSnapshot {
            helpful: self.helpful.load(Ordering::Relaxed),
            not_helpful: self.not_helpful.load(Ordering::Relaxed),
        }
    }
}

impl AppState {
    /// Create state backed by the Gemini API
    pub fn new(config: AppConfig) -> Result<Self> {
        let loader = GeminiModelLoader::new(config.gemini.clone())?;
        Ok(Self::with_model_loader(config, Arc::new(loader)))
    }

    /// Create state with a custom model loader
    pub fn with_model_loader(config: AppConfig, model_loader: Arc<dyn ModelLoader>) -> Self {
        tracing::info!(
            "Initializing application state (scratch: {}, index root: {})",
            config.storage.scratch_dir.display(),
            config.storage.index_root.display()
        );

        let orchestrator = Arc::new(Orchestrator::from_config(&config, model_loader));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                orchestrator,
                feedback: FeedbackCounters::default(),
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.inner.orchestrator)
    }

    pub fn feedback(&self) -> &FeedbackCounters {
        &self.inner.feedback
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}

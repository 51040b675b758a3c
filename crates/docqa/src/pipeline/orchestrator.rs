//! Sequences loader, model loader, index builder and query engine for one submission

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::report::{
    FailureReport, Outcome, PipelineState, RunReport, StatusUpdate, Submission,
};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::index::{IndexBuilder, IndexSettings};
use crate::ingestion::DocumentLoader;
use crate::providers::ModelLoader;
use crate::types::{QueryResult, UploadedFile};

/// Records transitions and forwards them to an optional listener
struct Progress {
    state: PipelineState,
    updates: Vec<StatusUpdate>,
    listener: Option<UnboundedSender<StatusUpdate>>,
}

impl Progress {
    fn new(listener: Option<UnboundedSender<StatusUpdate>>) -> Self {
        Self {
            state: PipelineState::Idle,
            updates: Vec::new(),
            listener,
        }
    }

    fn advance(&mut self, state: PipelineState, message: &str, progress: u8) {
        tracing::info!(state = ?state, progress, "{}", message);
        let update = StatusUpdate {
            state,
            message: message.to_string(),
            progress,
        };
        if let Some(tx) = &self.listener {
            // A closed listener only means nobody is watching any more
            let _ = tx.send(update.clone());
        }
        self.state = state;
        self.updates.push(update);
    }

    fn last_progress(&self) -> u8 {
        self.updates.last().map(|u| u.progress).unwrap_or(0)
    }
}

/// Race a step against the request's cancellation token
async fn cancellable<T>(
    cancel: &CancellationToken,
    step: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = step => result,
    }
}

/// Runs the document QA pipeline. Holds no per-request state, so one
/// instance serves every request concurrently.
pub struct Orchestrator {
    model_loader: Arc<dyn ModelLoader>,
    loader: DocumentLoader,
    builder: IndexBuilder,
    settings: IndexSettings,
}

impl Orchestrator {
    pub fn new(
        model_loader: Arc<dyn ModelLoader>,
        loader: DocumentLoader,
        builder: IndexBuilder,
        settings: IndexSettings,
    ) -> Self {
        Self {
            model_loader,
            loader,
            builder,
            settings,
        }
    }

    /// Wire the components from application config
    pub fn from_config(config: &AppConfig, model_loader: Arc<dyn ModelLoader>) -> Self {
        Self::new(
            model_loader,
            DocumentLoader::new(&config.storage.scratch_dir),
            IndexBuilder::new(&config.storage.index_root),
            IndexSettings::from_config(&config.index, &config.gemini),
        )
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    pub fn index_builder(&self) -> &IndexBuilder {
        &self.builder
    }

    /// Process one submission to a terminal state.
    ///
    /// Input problems end the run in `Idle` with a warning and touch no
    /// component. Component errors end it in `Error`; nothing is retried and
    /// a snapshot persisted before the failure stays on disk.
    pub async fn run(
        &self,
        submission: Submission,
        updates: Option<UnboundedSender<StatusUpdate>>,
        cancel: CancellationToken,
    ) -> RunReport {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("ask", %request_id, session = %submission.session);
        self.run_inner(request_id, submission, updates, cancel)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        request_id: Uuid,
        submission: Submission,
        updates: Option<UnboundedSender<StatusUpdate>>,
        cancel: CancellationToken,
    ) -> RunReport {
        let started = Instant::now();
        let mut progress = Progress::new(updates);

        let outcome = match submission.validate() {
            Err(warning) => {
                tracing::warn!("Submission rejected: {}", warning);
                Outcome::Warning(warning)
            }
            Ok(file) => match self.process(&submission, file, &mut progress, &cancel).await {
                Ok(result) => {
                    progress.advance(PipelineState::Answered, "Complete!", 100);
                    Outcome::Answered(result)
                }
                Err(e) => {
                    tracing::error!("Request failed: {}", e.detail());
                    let at = progress.last_progress();
                    progress.advance(
                        PipelineState::Error,
                        "Something went wrong while processing your request.",
                        at,
                    );
                    Outcome::Failed(FailureReport::from_error(&e))
                }
            },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(final_state = ?progress.state, elapsed_ms, "Request finished");

        RunReport {
            request_id,
            final_state: progress.state,
            progress: progress.updates,
            outcome,
            elapsed_ms,
        }
    }

    async fn process(
        &self,
        submission: &Submission,
        file: &UploadedFile,
        progress: &mut Progress,
        cancel: &CancellationToken,
    ) -> Result<QueryResult> {
        progress.advance(PipelineState::Loading, "Loading document...", 20);
        let documents = cancellable(cancel, self.loader.load(file)).await?;

        progress.advance(PipelineState::Loading, "Initializing AI model...", 40);
        let model = cancellable(cancel, self.model_loader.load()).await?;

        progress.advance(PipelineState::ModelReady, "Creating document embeddings...", 60);
        let engine = cancellable(
            cancel,
            self.builder
                .build(&model, documents, &self.settings, &submission.session),
        )
        .await?;

        progress.advance(PipelineState::Indexed, "Generating your answer...", 80);
        cancellable(cancel, engine.query(&submission.question, &submission.options)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ModelHandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RejectingLoader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelLoader for RejectingLoader {
        async fn load(&self) -> Result<ModelHandle> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Config("API key not valid".into()))
        }
    }

    fn orchestrator(root: &std::path::Path, loader: Arc<RejectingLoader>) -> Orchestrator {
        Orchestrator::new(
            loader,
            DocumentLoader::new(root.join("temp_data")),
            IndexBuilder::new(root.join("storage")),
            IndexSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_warning_leaves_run_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Arc::new(RejectingLoader {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(tmp.path(), loader.clone());

        let report = orch
            .run(Submission::new(None, "What?"), None, CancellationToken::new())
            .await;

        assert_eq!(report.final_state, PipelineState::Idle);
        assert!(report.progress.is_empty());
        assert!(report.warning().is_some());
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_model_failure_reports_error_state() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Arc::new(RejectingLoader {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(tmp.path(), loader.clone());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let file = UploadedFile::new("notes.txt", b"Some text.".to_vec(), None);
        let report = orch
            .run(Submission::new(Some(file), "Why?"), Some(tx), CancellationToken::new())
            .await;

        assert_eq!(report.final_state, PipelineState::Error);
        let failure = report.failure().unwrap();
        assert_eq!(failure.kind, crate::error::ErrorKind::Configuration);
        assert_eq!(failure.troubleshooting.len(), 5);
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        let mut streamed = Vec::new();
        while let Ok(update) = rx.try_recv() {
            streamed.push(update);
        }
        assert_eq!(streamed, report.progress);
        let percents: Vec<u8> = streamed.iter().map(|u| u.progress).collect();
        assert_eq!(percents, vec![20, 40, 40]);
        assert!(!tmp.path().join("storage").exists());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tmp = tempfile::tempdir().unwrap();
        let loader = Arc::new(RejectingLoader {
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(tmp.path(), loader.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let file = UploadedFile::new("notes.txt", b"Some text.".to_vec(), None);
        let report = orch.run(Submission::new(Some(file), "Why?"), None, cancel).await;

        assert_eq!(report.final_state, PipelineState::Error);
        assert_eq!(
            report.failure().unwrap().kind,
            crate::error::ErrorKind::Cancelled
        );
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }
}

//! The sequential job state machine.

use crate::artifacts::{ArtifactStore, CleanupPolicy, THUMBNAIL};
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::pipeline::{stages_for, CancelFlag, JobKind, JobState};
use crate::process::ProcessRegistry;
use crate::progress::ProgressBroadcaster;
use crate::source::{fetch_thumbnail, SourceInfo, SourceProvider};
use crate::stage::{InputSource, StageExecutor, StageSpec};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the stage list for a job kind. Injectable so tests can run the
/// controller against stub commands instead of the real tools.
pub type TemplateFn = Box<dyn Fn(JobKind, &EngineConfig) -> Vec<StageSpec> + Send + Sync>;

/// The terminal result of a successful job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// The job shape that ran.
    pub kind: JobKind,
    /// Where the deliverable lives.
    pub final_path: PathBuf,
    /// Metadata of the processed source.
    pub source: SourceInfo,
}

/// Advances one job at a time through
/// `Idle → FetchingSource → Stage(..) → Cleanup → Done | Failed`.
///
/// The subscriber set, the pid set, and the source provider are injected;
/// the controller owns only the per-job state. Exactly one job runs at a
/// time — a second [`PipelineController::run`] while one is in flight
/// returns [`EngineError::Busy`].
pub struct PipelineController {
    config: EngineConfig,
    source: Arc<dyn SourceProvider>,
    registry: Arc<ProcessRegistry>,
    broadcaster: Arc<ProgressBroadcaster>,
    templates: TemplateFn,
    cancel: CancelFlag,
    state: Mutex<JobState>,
    running: AtomicBool,
    http: reqwest::Client,
}

impl PipelineController {
    /// Creates a controller with the production stage templates.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn SourceProvider>,
        registry: Arc<ProcessRegistry>,
        broadcaster: Arc<ProgressBroadcaster>,
    ) -> Self {
        Self {
            config,
            source,
            registry,
            broadcaster,
            templates: Box::new(stages_for),
            cancel: CancelFlag::new(),
            state: Mutex::new(JobState::Idle),
            running: AtomicBool::new(false),
            http: reqwest::Client::new(),
        }
    }

    /// Replaces the stage templates.
    #[must_use]
    pub fn with_templates(mut self, templates: TemplateFn) -> Self {
        self.templates = templates;
        self
    }

    /// The current job state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.state.lock().clone()
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The injected source provider.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn SourceProvider> {
        &self.source
    }

    /// The progress broadcaster observers attach to.
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    /// The process registry backing cancellation.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    fn set_state(&self, state: JobState) {
        info!(state = %state, "job state");
        *self.state.lock() = state;
    }

    /// Runs one job to completion.
    ///
    /// # Errors
    ///
    /// [`EngineError::Busy`] when a job is already in flight; otherwise the
    /// first failure encountered, stage-attributed where applicable. Any
    /// failure triggers a full artifact cleanup so a retry starts from a
    /// clean filesystem.
    pub async fn run(&self, url: &str, kind: JobKind) -> Result<JobOutcome, EngineError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(EngineError::Busy);
        }

        let result = self.run_inner(url, kind).await;
        if result.is_err() {
            ArtifactStore::for_job(kind, &self.config)
                .cleanup(CleanupPolicy::Full)
                .await;
        }
        match &result {
            Ok(outcome) => self.set_state(JobState::Done(outcome.final_path.clone())),
            Err(e) => self.set_state(JobState::Failed(e.to_string())),
        }
        self.running.store(false, Ordering::SeqCst);
        result
    }

    async fn run_inner(&self, url: &str, kind: JobKind) -> Result<JobOutcome, EngineError> {
        self.cancel.reset();
        let store = ArtifactStore::for_job(kind, &self.config);

        self.set_state(JobState::FetchingSource);
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        // Clear stale artifacts from any prior run before spawning anything.
        store.cleanup(CleanupPolicy::Full).await;

        let source = self.source.resolve(url).await?;
        self.broadcaster
            .broadcast(&format!("Processing \"{}\"", source.title));

        if let Some(thumbnail_url) = &source.thumbnail_url {
            let dest = self.config.artifact_path(THUMBNAIL);
            match fetch_thumbnail(&self.http, thumbnail_url, &dest).await {
                Ok(true) => {}
                Ok(false) => {}
                Err(e) => warn!(error = %e, "thumbnail fetch failed, continuing without it"),
            }
        }

        let mut audio = Some(self.source.open_audio(url).await?);
        let executor = StageExecutor::new(self.registry.clone(), self.broadcaster.clone());
        let stages = (self.templates)(kind, &self.config);

        for spec in &stages {
            self.set_state(JobState::Stage(spec.name.clone()));
            let feed = match spec.input {
                InputSource::Stdin => audio.take(),
                InputSource::Artifacts => None,
            };
            if let Err(failure) = executor.run(spec, feed).await {
                // A stage killed by cancel_all surfaces here as an exit
                // failure; report it as what it was.
                if self.cancel.is_cancelled() {
                    self.broadcaster.broadcast("Processing cancelled.");
                    return Err(EngineError::Cancelled {
                        stage: failure.stage,
                    });
                }
                self.broadcaster
                    .broadcast(&format!("Stage '{}' failed.", failure.stage));
                return Err(failure.into());
            }
        }

        self.set_state(JobState::Cleanup);
        store.cleanup(CleanupPolicy::PreserveFinal).await;

        let final_path = store
            .final_path()
            .map_or_else(|| self.config.artifact_path(kind.final_artifact()), PathBuf::from);
        self.broadcaster.broadcast("Job complete.");

        Ok(JobOutcome {
            kind,
            final_path,
            source,
        })
    }

    /// Arms the cancellation flag and terminates every registered process
    /// tree. Returns the number of pids signalled.
    pub async fn cancel(&self) -> usize {
        self.cancel.cancel("cancelled by request");
        self.registry.cancel_all().await
    }

    /// Removes every artifact, the final deliverable included. Returns the
    /// paths that were removed.
    pub async fn delete_all_artifacts(&self) -> Vec<PathBuf> {
        // The full-video set is a superset of every job shape's artifacts.
        ArtifactStore::for_job(JobKind::FullVideo, &self.config)
            .cleanup(CleanupPolicy::Full)
            .await
    }

    /// Removes only the final video. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors other than the file being absent.
    pub async fn delete_final_video(&self) -> std::io::Result<bool> {
        ArtifactStore::for_job(JobKind::FullVideo, &self.config)
            .delete_final()
            .await
    }

    /// Where the final video lives when present.
    #[must_use]
    pub fn final_video_path(&self) -> PathBuf {
        self.config.artifact_path(JobKind::FullVideo.final_artifact())
    }
}

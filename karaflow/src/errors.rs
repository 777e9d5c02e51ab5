//! Error types for the karaflow engine.
//!
//! The taxonomy mirrors the failure surface of the pipeline: URL validation,
//! upstream metadata retrieval, per-stage process contracts, cancellation,
//! and the single-job-in-flight gate.

use std::path::PathBuf;
use thiserror::Error;

/// Why a pipeline stage failed.
///
/// The three variants map to the three ways an external tool can break its
/// contract: it never started, it exited unhappily, or it claimed success
/// without producing the artifact it is contracted to write.
#[derive(Debug, Clone, Error)]
pub enum FailureReason {
    /// The stage executable could not be started.
    #[error("failed to spawn '{command}': {message}")]
    Spawn {
        /// The program that failed to start.
        command: String,
        /// The underlying OS error text.
        message: String,
    },

    /// The process exited with a non-zero status, or was killed by a signal
    /// (in which case no exit code is available).
    #[error("process exited with {}", code.map_or_else(|| "a killed status".to_string(), |c| format!("status {c}")))]
    NonZeroExit {
        /// The exit code, if the process exited normally.
        code: Option<i32>,
    },

    /// The process exited with status zero but the expected output file is
    /// absent. External tools may report success while silently producing
    /// nothing; this is caught explicitly rather than trusting the status.
    #[error("expected artifact missing: {}", path.display())]
    MissingArtifact {
        /// The artifact path that should have existed.
        path: PathBuf,
    },
}

/// A stage-attributed failure produced by the stage executor.
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed: {reason}")]
pub struct StageFailure {
    /// The name of the failing stage.
    pub stage: String,
    /// What went wrong.
    pub reason: FailureReason,
}

impl StageFailure {
    /// Creates a spawn failure.
    #[must_use]
    pub fn spawn(
        stage: impl Into<String>,
        command: impl Into<String>,
        error: &std::io::Error,
    ) -> Self {
        Self {
            stage: stage.into(),
            reason: FailureReason::Spawn {
                command: command.into(),
                message: error.to_string(),
            },
        }
    }

    /// Creates a non-zero-exit failure.
    #[must_use]
    pub fn non_zero_exit(stage: impl Into<String>, code: Option<i32>) -> Self {
        Self {
            stage: stage.into(),
            reason: FailureReason::NonZeroExit { code },
        }
    }

    /// Creates a missing-artifact failure.
    #[must_use]
    pub fn missing_artifact(stage: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            stage: stage.into(),
            reason: FailureReason::MissingArtifact { path: path.into() },
        }
    }

    /// Returns true if the process died without a normal exit code, which is
    /// what a killed process tree looks like from the parent's side.
    #[must_use]
    pub fn was_killed(&self) -> bool {
        matches!(self.reason, FailureReason::NonZeroExit { code: None })
    }
}

/// Error raised when a stage template is structurally invalid.
///
/// Templates are assembled in code, so this surfaces programming mistakes
/// (empty names, inverted progress slices) rather than runtime conditions.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
}

impl PipelineValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The main error type for pipeline jobs.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted URL is malformed or unsupported. Nothing was spawned.
    #[error("invalid or unsupported URL: {url}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
    },

    /// Metadata or audio-source retrieval from the upstream provider failed.
    #[error("source retrieval failed: {message}")]
    SourceFetch {
        /// What the provider reported.
        message: String,
    },

    /// A pipeline stage failed.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// The job was terminated by an explicit cancellation request.
    #[error("job cancelled during stage '{stage}'")]
    Cancelled {
        /// The stage that was running when cancellation landed.
        stage: String,
    },

    /// A job is already in flight; only one runs at a time.
    #[error("a job is already in flight")]
    Busy,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Creates an invalid-URL error.
    #[must_use]
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a source-fetch error.
    #[must_use]
    pub fn source_fetch(message: impl Into<String>) -> Self {
        Self::SourceFetch {
            message: message.into(),
        }
    }

    /// Returns the name of the failing stage, if this error is attributable
    /// to one.
    #[must_use]
    pub fn failing_stage(&self) -> Option<&str> {
        match self {
            Self::Stage(failure) => Some(&failure.stage),
            Self::Cancelled { stage } => Some(stage),
            _ => None,
        }
    }

    /// Converts the error to the JSON body served at the HTTP boundary.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let Some(stage) = self.failing_stage() {
            body["stage"] = serde_json::json!(stage);
        }
        body
    }
}

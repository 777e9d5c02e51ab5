//! Pipeline composition and execution.
//!
//! This module provides:
//! - Job kinds and their stage templates
//! - The per-job state machine
//! - The controller that advances a job through its stages

mod cancel;
mod controller;
mod templates;

pub use cancel::CancelFlag;
pub use controller::{JobOutcome, PipelineController, TemplateFn};
pub use templates::stages_for;

use crate::artifacts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The shape of a requested job.
///
/// Both kinds run the same generic stage template mechanism; they differ in
/// which stages are included and which artifact is the deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Produce only the vocal-removed instrumental track.
    AudioOnly,
    /// Produce the captioned karaoke video.
    FullVideo,
}

impl JobKind {
    /// The well-known filename of this job's deliverable.
    #[must_use]
    pub fn final_artifact(&self) -> &'static str {
        match self {
            Self::AudioOnly => artifacts::INSTRUMENTAL,
            Self::FullVideo => artifacts::FINAL_VIDEO,
        }
    }

    /// The content type the deliverable is served with.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::AudioOnly => "audio/wav",
            Self::FullVideo => "video/mp4",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AudioOnly => write!(f, "audio_only"),
            Self::FullVideo => write!(f, "full_video"),
        }
    }
}

/// The state machine a job moves through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobState {
    /// No job has run yet.
    #[default]
    Idle,
    /// Resolving metadata and opening the audio source.
    FetchingSource,
    /// Running the named stage.
    Stage(String),
    /// Applying the post-job deletion policy.
    Cleanup,
    /// The job finished; the deliverable lives at the given path.
    Done(PathBuf),
    /// The job failed with the given stage-attributed message.
    Failed(String),
}

impl JobState {
    /// Whether this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::FetchingSource => write!(f, "fetching_source"),
            Self::Stage(name) => write!(f, "stage:{name}"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::Done(_) => write!(f, "done"),
            Self::Failed(_) => write!(f, "failed"),
        }
    }
}

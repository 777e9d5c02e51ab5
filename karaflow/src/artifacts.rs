//! Intermediate artifact management.
//!
//! Every stage reads and writes fixed, well-known filenames inside the work
//! directory; there is no database and no job-scoped namespacing. A new job
//! overwrites the previous job's files, which is acceptable only under the
//! single-job-in-flight assumption.

use crate::config::EngineConfig;
use crate::pipeline::JobKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Transcoded source audio, fed to the separator.
pub const SOURCE_AUDIO: &str = "yt_temp.wav";
/// The vocal-removed instrumental track.
pub const INSTRUMENTAL: &str = "no_vocals.wav";
/// The isolated vocal track, used for caption timing.
pub const VOCALS: &str = "vocals.wav";
/// The source thumbnail image.
pub const THUMBNAIL: &str = "thumb.png";
/// The blurred background video the captions are composited onto.
pub const BACKGROUND_VIDEO: &str = "blurred_video.mp4";
/// The generated caption script.
pub const CAPTIONS: &str = "lyrics.ass";
/// The final captioned karaoke video.
pub const FINAL_VIDEO: &str = "output_video_with_lyrics.mp4";

/// When an artifact may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionClass {
    /// Always removed by cleanup.
    Intermediate,
    /// The job's deliverable; removed only by a full cleanup or an explicit
    /// delete request.
    Final,
}

/// Which artifacts a cleanup pass removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPolicy {
    /// Remove everything, the final deliverable included.
    Full,
    /// Remove intermediates but keep the final deliverable servable.
    PreserveFinal,
}

/// One file a stage is contracted to produce at a fixed path.
#[derive(Debug, Clone)]
pub struct TempArtifact {
    /// Where the artifact lives on disk.
    pub path: PathBuf,
    /// The stage (or collaborator) that writes it.
    pub produced_by: &'static str,
    /// Its deletion policy.
    pub deletion_class: DeletionClass,
}

/// Owns the set of well-known artifact paths for one job shape and applies
/// deletion policies to them.
///
/// Cleanup is idempotent and callable at any time: before a job to clear
/// stale files from a prior run, and after a job whether it succeeded or
/// not. Deleting a missing file is a no-op, never an error.
#[derive(Debug)]
pub struct ArtifactStore {
    artifacts: Vec<TempArtifact>,
}

impl ArtifactStore {
    /// Builds the artifact set for a job kind. Which path counts as the
    /// final deliverable depends on the kind: the instrumental track for
    /// audio-only jobs, the captioned video otherwise.
    #[must_use]
    pub fn for_job(kind: JobKind, config: &EngineConfig) -> Self {
        let artifact = |name: &str, produced_by, deletion_class| TempArtifact {
            path: config.artifact_path(name),
            produced_by,
            deletion_class,
        };

        let artifacts = match kind {
            JobKind::AudioOnly => vec![
                artifact(SOURCE_AUDIO, "transcode", DeletionClass::Intermediate),
                artifact(VOCALS, "separate", DeletionClass::Intermediate),
                artifact(THUMBNAIL, "thumbnail", DeletionClass::Intermediate),
                artifact(INSTRUMENTAL, "separate", DeletionClass::Final),
            ],
            JobKind::FullVideo => vec![
                artifact(SOURCE_AUDIO, "transcode", DeletionClass::Intermediate),
                artifact(INSTRUMENTAL, "separate", DeletionClass::Intermediate),
                artifact(VOCALS, "separate", DeletionClass::Intermediate),
                artifact(THUMBNAIL, "thumbnail", DeletionClass::Intermediate),
                artifact(BACKGROUND_VIDEO, "render", DeletionClass::Intermediate),
                artifact(CAPTIONS, "render", DeletionClass::Intermediate),
                artifact(FINAL_VIDEO, "render", DeletionClass::Final),
            ],
        };

        Self { artifacts }
    }

    /// The artifacts this store manages.
    #[must_use]
    pub fn artifacts(&self) -> &[TempArtifact] {
        &self.artifacts
    }

    /// The final deliverable's path, if this job shape has one.
    #[must_use]
    pub fn final_path(&self) -> Option<&Path> {
        self.artifacts
            .iter()
            .find(|a| a.deletion_class == DeletionClass::Final)
            .map(|a| a.path.as_path())
    }

    /// Removes every artifact matching the policy, silently skipping files
    /// that do not exist. Returns the paths that were actually removed.
    pub async fn cleanup(&self, policy: CleanupPolicy) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        for artifact in &self.artifacts {
            if policy == CleanupPolicy::PreserveFinal
                && artifact.deletion_class == DeletionClass::Final
            {
                continue;
            }
            match tokio::fs::remove_file(&artifact.path).await {
                Ok(()) => {
                    info!(path = %artifact.path.display(), "removed artifact");
                    removed.push(artifact.path.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    // Cleanup never fails the job; an undeletable file is
                    // reported and left behind.
                    warn!(path = %artifact.path.display(), error = %e, "failed to remove artifact");
                }
            }
        }
        removed
    }

    /// Removes only the final deliverable. Returns whether it existed, so
    /// callers can report not-found rather than erroring on a second call.
    pub async fn delete_final(&self) -> std::io::Result<bool> {
        let Some(path) = self.final_path() else {
            return Ok(false);
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "removed final artifact");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn touch(path: &Path) {
        tokio::fs::write(path, b"x").await.unwrap();
    }

    fn store_in(dir: &Path, kind: JobKind) -> ArtifactStore {
        let config = EngineConfig::new().with_work_dir(dir);
        ArtifactStore::for_job(kind, &config)
    }

    #[tokio::test]
    async fn test_full_cleanup_removes_everything_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), JobKind::FullVideo);
        for artifact in store.artifacts() {
            touch(&artifact.path).await;
        }

        let removed = store.cleanup(CleanupPolicy::Full).await;
        assert_eq!(removed.len(), store.artifacts().len());
        for artifact in store.artifacts() {
            assert!(!artifact.path.exists());
        }

        // Second pass has nothing to do and raises nothing.
        let removed = store.cleanup(CleanupPolicy::Full).await;
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn test_preserve_final_keeps_the_deliverable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), JobKind::FullVideo);
        for artifact in store.artifacts() {
            touch(&artifact.path).await;
        }

        store.cleanup(CleanupPolicy::PreserveFinal).await;

        let final_path = store.final_path().unwrap();
        assert!(final_path.exists());
        assert!(final_path.ends_with(FINAL_VIDEO));
        for artifact in store.artifacts() {
            if artifact.deletion_class == DeletionClass::Intermediate {
                assert!(!artifact.path.exists());
            }
        }
    }

    #[tokio::test]
    async fn test_audio_only_final_is_the_instrumental() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), JobKind::AudioOnly);
        assert!(store.final_path().unwrap().ends_with(INSTRUMENTAL));
    }

    #[tokio::test]
    async fn test_delete_final_reports_absence_second_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), JobKind::FullVideo);
        touch(store.final_path().unwrap()).await;

        assert!(store.delete_final().await.unwrap());
        assert!(!store.delete_final().await.unwrap());
    }

    #[tokio::test]
    async fn test_cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path(), JobKind::AudioOnly);
        // Nothing on disk at all.
        let removed = store.cleanup(CleanupPolicy::Full).await;
        assert!(removed.is_empty());
    }
}

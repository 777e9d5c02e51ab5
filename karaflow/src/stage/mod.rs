//! Stage definitions and execution.
//!
//! A stage is one external transformation step: a fixed command, an
//! expected output artifact, and a slice of the overall progress range.
//! Stages are immutable once built and are composed into a pipeline
//! template per job kind.

mod executor;

pub use executor::{StageExecutor, StageFeed, StageSuccess};

use crate::errors::PipelineValidationError;
use crate::progress::{ProgressPattern, ProgressRange};
use std::path::PathBuf;

/// Where a stage's input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSource {
    /// The stage reads its inputs itself, from fixed artifact paths.
    #[default]
    Artifacts,
    /// The stage consumes a byte stream piped to its stdin.
    Stdin,
}

/// An ordered step in a pipeline: one external process invocation with its
/// success contract and progress conventions.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The stage name, used for progress attribution and error reporting.
    pub name: String,
    /// The program to spawn.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Where the stage's input comes from.
    pub input: InputSource,
    /// The artifact the process is contracted to produce. A zero exit
    /// status without this file on disk is a failure.
    pub expected_output: PathBuf,
    /// The slice of the overall 0–100% range this stage occupies.
    pub progress: ProgressRange,
    /// How the process output is scanned for progress markers.
    pub pattern: ProgressPattern,
}

impl StageSpec {
    /// Creates a stage specification with the default `NN%` marker pattern
    /// and an empty progress slice.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        expected_output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            input: InputSource::Artifacts,
            expected_output: expected_output.into(),
            progress: ProgressRange::new(0, 0),
            pattern: ProgressPattern::percent_marker(),
        }
    }

    /// Sets the arguments.
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the stage as consuming a byte stream on stdin.
    #[must_use]
    pub fn reads_stdin(mut self) -> Self {
        self.input = InputSource::Stdin;
        self
    }

    /// Sets the progress slice.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressRange) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the progress pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: ProgressPattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Validates the specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or the progress slice is
    /// inverted.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("stage name cannot be empty"));
        }
        if self.progress.end < self.progress.start {
            return Err(PipelineValidationError::new(format!(
                "stage '{}' has an inverted progress slice ({}..{})",
                self.name, self.progress.start, self.progress.end
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_builder() {
        let spec = StageSpec::new("transcode", "ffmpeg", "/work/yt_temp.wav")
            .with_args(["-y", "-i", "pipe:0"])
            .reads_stdin()
            .with_progress(ProgressRange::new(0, 5));

        assert_eq!(spec.name, "transcode");
        assert_eq!(spec.input, InputSource::Stdin);
        assert_eq!(spec.args.len(), 3);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let spec = StageSpec::new("  ", "ffmpeg", "/out");
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_slice() {
        let spec =
            StageSpec::new("separate", "demucs", "/out").with_progress(ProgressRange::new(50, 10));
        assert!(spec.validate().is_err());
    }
}

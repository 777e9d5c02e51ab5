//! Stage templates per job kind.
//!
//! The stage list for a job is data, not control flow: the controller walks
//! whatever template it is handed, so new job shapes only touch this file.

use crate::artifacts::{FINAL_VIDEO, INSTRUMENTAL, SOURCE_AUDIO};
use crate::config::{path_arg, EngineConfig};
use crate::pipeline::JobKind;
use crate::progress::{ProgressPattern, ProgressRange};
use crate::stage::StageSpec;

/// The renderer's terminal output line; it signals completion with a phrase
/// rather than a final `100%`.
const RENDER_COMPLETE_MARKER: &str = "Process complete";

/// Builds the ordered stage list for a job kind.
///
/// Progress slices: the transcode occupies a small leading window (ffmpeg
/// emits no `NN%` markers, so the job simply sits at the window's start
/// until the separator begins reporting), the separator runs to 50% when a
/// render follows and to 100% otherwise, and the render covers the rest.
#[must_use]
pub fn stages_for(kind: JobKind, config: &EngineConfig) -> Vec<StageSpec> {
    let source_audio = config.artifact_path(SOURCE_AUDIO);
    let work_dir = path_arg(&config.work_dir);

    let transcode = StageSpec::new("transcode", &config.ffmpeg_bin, &source_audio)
        .with_args(vec![
            "-y".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-f".to_string(),
            "wav".to_string(),
            "-q:a".to_string(),
            "0".to_string(),
            path_arg(&source_audio),
        ])
        .reads_stdin()
        .with_progress(ProgressRange::new(0, 5));

    let separate_end = match kind {
        JobKind::AudioOnly => 100,
        JobKind::FullVideo => 50,
    };
    let separate = StageSpec::new(
        "separate",
        &config.python_bin,
        config.artifact_path(INSTRUMENTAL),
    )
    .with_args(vec![
        path_arg(&config.script_path("separate_audio.py")),
        work_dir.clone(),
    ])
    .with_progress(ProgressRange::new(5, separate_end));

    match kind {
        JobKind::AudioOnly => vec![transcode, separate],
        JobKind::FullVideo => {
            let render = StageSpec::new(
                "render",
                &config.python_bin,
                config.artifact_path(FINAL_VIDEO),
            )
            .with_args(vec![
                path_arg(&config.script_path("generate_video.py")),
                work_dir,
            ])
            .with_progress(ProgressRange::new(50, 100))
            .with_pattern(
                ProgressPattern::percent_marker().with_completion_marker(RENDER_COMPLETE_MARKER),
            );
            vec![transcode, separate, render]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::InputSource;

    #[test]
    fn test_audio_only_template() {
        let config = EngineConfig::new().with_work_dir("/w");
        let stages = stages_for(JobKind::AudioOnly, &config);

        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].name, "transcode");
        assert_eq!(stages[0].input, InputSource::Stdin);
        assert_eq!(stages[1].name, "separate");
        assert_eq!(stages[1].progress.end, 100);
        assert!(stages[1]
            .expected_output
            .ends_with("no_vocals.wav"));
    }

    #[test]
    fn test_full_video_template() {
        let config = EngineConfig::new().with_work_dir("/w");
        let stages = stages_for(JobKind::FullVideo, &config);

        assert_eq!(stages.len(), 3);
        assert_eq!(stages[2].name, "render");
        assert!(stages[2]
            .expected_output
            .ends_with("output_video_with_lyrics.mp4"));
    }

    #[test]
    fn test_slices_are_contiguous_and_cover_the_range() {
        let config = EngineConfig::new();
        for kind in [JobKind::AudioOnly, JobKind::FullVideo] {
            let stages = stages_for(kind, &config);
            assert_eq!(stages[0].progress.start, 0);
            assert_eq!(stages.last().unwrap().progress.end, 100);
            for pair in stages.windows(2) {
                assert_eq!(pair[0].progress.end, pair[1].progress.start);
            }
        }
    }

    #[test]
    fn test_all_template_stages_validate() {
        let config = EngineConfig::new();
        for kind in [JobKind::AudioOnly, JobKind::FullVideo] {
            for stage in stages_for(kind, &config) {
                stage.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_only_the_transcode_reads_stdin() {
        let config = EngineConfig::new();
        let stages = stages_for(JobKind::FullVideo, &config);
        let stdin_stages: Vec<_> = stages
            .iter()
            .filter(|s| s.input == InputSource::Stdin)
            .collect();
        assert_eq!(stdin_stages.len(), 1);
        assert_eq!(stdin_stages[0].name, "transcode");
    }
}

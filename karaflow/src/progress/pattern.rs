//! Extraction of progress markers from tool output.

use regex::Regex;

/// The default marker convention: the first `NN%` substring on a line.
const PERCENT_PATTERN: &str = r"(\d+)%";

/// A signal extracted from one line of tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// A raw stage-local percentage (clamped to 100).
    Percent(u8),
    /// The tool's terminal completion phrase was seen. Some tools finish
    /// with a sentinel line rather than a final `100%`.
    Complete,
}

/// How one stage's output is scanned for progress.
///
/// Each stage carries its own pattern so tools with different output
/// conventions can be composed without touching the controller.
#[derive(Debug, Clone)]
pub struct ProgressPattern {
    regex: Regex,
    completion_marker: Option<String>,
}

impl ProgressPattern {
    /// Creates a pattern from a custom regex whose first capture group is
    /// the integer percentage.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            completion_marker: None,
        })
    }

    /// The standard `NN%` marker convention.
    #[must_use]
    #[allow(clippy::expect_used)] // the pattern is a compile-time constant
    pub fn percent_marker() -> Self {
        Self {
            regex: Regex::new(PERCENT_PATTERN).expect("static percent pattern"),
            completion_marker: None,
        }
    }

    /// Also recognize a terminal completion phrase, treated as equivalent to
    /// reaching the end of the stage's progress slice.
    #[must_use]
    pub fn with_completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.completion_marker = Some(marker.into());
        self
    }

    /// Scans one line of output. Returns `None` for lines carrying no
    /// recognizable marker; such lines are forwarded verbatim as
    /// diagnostics.
    #[must_use]
    pub fn parse(&self, line: &str) -> Option<ProgressSignal> {
        if let Some(marker) = &self.completion_marker {
            if line.contains(marker.as_str()) {
                return Some(ProgressSignal::Complete);
            }
        }
        let captures = self.regex.captures(line)?;
        let digits = captures.get(1)?.as_str();
        let value: u32 = digits.parse().ok()?;
        Some(ProgressSignal::Percent(value.min(100) as u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_percent_line() {
        let pattern = ProgressPattern::percent_marker();
        assert_eq!(pattern.parse("42%"), Some(ProgressSignal::Percent(42)));
    }

    #[test]
    fn test_percent_embedded_in_text() {
        let pattern = ProgressPattern::percent_marker();
        assert_eq!(
            pattern.parse("frame 1200 done, 73% complete"),
            Some(ProgressSignal::Percent(73))
        );
    }

    #[test]
    fn test_non_progress_line() {
        let pattern = ProgressPattern::percent_marker();
        assert_eq!(pattern.parse("loading model weights"), None);
    }

    #[test]
    fn test_oversized_percent_clamped() {
        let pattern = ProgressPattern::percent_marker();
        assert_eq!(pattern.parse("350%"), Some(ProgressSignal::Percent(100)));
    }

    #[test]
    fn test_completion_marker_wins() {
        let pattern = ProgressPattern::percent_marker().with_completion_marker("Process complete");
        assert_eq!(pattern.parse("Process complete."), Some(ProgressSignal::Complete));
        // Percent lines still parse as usual.
        assert_eq!(pattern.parse("99%"), Some(ProgressSignal::Percent(99)));
    }

    #[test]
    fn test_custom_pattern() {
        let pattern = ProgressPattern::new(r"progress=(\d+)/100").unwrap();
        assert_eq!(
            pattern.parse("progress=61/100"),
            Some(ProgressSignal::Percent(61))
        );
        assert_eq!(pattern.parse("61%"), None);
    }

    #[test]
    fn test_invalid_custom_pattern_rejected() {
        assert!(ProgressPattern::new(r"(\d+").is_err());
    }
}

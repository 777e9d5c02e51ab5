//! Progress normalization and fan-out.
//!
//! Heterogeneous external tools report completion in their own terms; this
//! module remaps each tool's raw 0–100 percentage into the slice of the
//! overall job that its stage occupies, and fans the resulting text out to
//! every attached observer.

mod broadcaster;
mod pattern;

pub use broadcaster::{ProgressBroadcaster, SubscriberId};
pub use pattern::{ProgressPattern, ProgressSignal};

use serde::{Deserialize, Serialize};

/// The slice of the overall 0–100% job range allotted to one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRange {
    /// Overall percent at which the stage begins.
    pub start: u8,
    /// Overall percent at which the stage completes.
    pub end: u8,
}

impl ProgressRange {
    /// Creates a new range. `start` must not exceed `end`; both are capped
    /// at 100 by [`ProgressRange::map`].
    #[must_use]
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Remaps a raw stage-local percentage into this slice, rounding to the
    /// nearest integer. Raw values above 100 are clamped, so the result
    /// always lands within `[start, end]`.
    #[must_use]
    pub fn map(&self, raw: u8) -> u8 {
        let raw = u32::from(raw.min(100));
        let span = u32::from(self.end.saturating_sub(self.start));
        let offset = (raw * span + 50) / 100;
        self.start.saturating_add(offset as u8)
    }

    /// The width of the slice in overall percent.
    #[must_use]
    pub fn span(&self) -> u8 {
        self.end.saturating_sub(self.start)
    }
}

/// A single normalized progress observation.
///
/// Ephemeral: produced by the stage executor, handed straight to the
/// broadcaster, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// The stage that emitted the underlying output.
    pub stage: String,
    /// The percentage as the tool reported it.
    pub raw_percent: u8,
    /// The percentage after remapping into the stage's slice.
    pub mapped_percent: u8,
    /// The output line the percentage was extracted from.
    pub raw_text: String,
}

impl ProgressEvent {
    /// The text form delivered to subscribers.
    #[must_use]
    pub fn log_line(&self) -> String {
        format!("Progress: {}%", self.mapped_percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_map_lower_half() {
        let range = ProgressRange::new(0, 50);
        assert_eq!(range.map(0), 0);
        assert_eq!(range.map(10), 5);
        assert_eq!(range.map(50), 25);
        assert_eq!(range.map(100), 50);
    }

    #[test]
    fn test_map_upper_half() {
        let range = ProgressRange::new(50, 100);
        assert_eq!(range.map(0), 50);
        assert_eq!(range.map(20), 60);
        assert_eq!(range.map(100), 100);
    }

    #[test]
    fn test_map_rounds_to_nearest() {
        // 33% of a 10-wide slice is 3.3, which rounds down; 35% is 3.5,
        // which rounds up.
        let range = ProgressRange::new(0, 10);
        assert_eq!(range.map(33), 3);
        assert_eq!(range.map(35), 4);
    }

    #[test]
    fn test_map_clamps_overflowing_raw() {
        let range = ProgressRange::new(10, 50);
        assert_eq!(range.map(250), 50);
    }

    #[test]
    fn test_map_is_monotone_and_bounded() {
        let range = ProgressRange::new(5, 95);
        let mut previous = 0;
        for raw in 0..=100 {
            let mapped = range.map(raw);
            assert!(mapped >= previous);
            assert!(mapped >= range.start && mapped <= range.end);
            previous = mapped;
        }
    }

    #[test]
    fn test_empty_slice_never_advances() {
        let range = ProgressRange::new(5, 5);
        assert_eq!(range.map(0), 5);
        assert_eq!(range.map(100), 5);
    }

    #[test]
    fn test_event_log_line() {
        let event = ProgressEvent {
            stage: "separate".to_string(),
            raw_percent: 50,
            mapped_percent: 25,
            raw_text: "50%".to_string(),
        };
        assert_eq!(event.log_line(), "Progress: 25%");
    }
}

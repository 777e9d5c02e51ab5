//! Cancellation flag shared between the controller and the HTTP adapter.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records that an out-of-band cancellation request landed.
///
/// Cancellation of the running processes themselves is the process
/// registry's job; this flag only lets the controller tell a killed stage
/// apart from one that failed on its own. Idempotent: the first reason
/// wins.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl CancelFlag {
    /// Creates an unarmed flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the flag with a reason. Only the first reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            *self.reason.write() = Some(reason.into());
        }
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// The cancellation reason, if armed.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.reason.read().clone()
    }

    /// Disarms the flag for the next job.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
        *self.reason.write() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let flag = CancelFlag::new();
        flag.cancel("user request");
        flag.cancel("second request");

        assert!(flag.is_cancelled());
        assert_eq!(flag.reason(), Some("user request".to_string()));
    }

    #[test]
    fn test_reset_disarms() {
        let flag = CancelFlag::new();
        flag.cancel("user request");
        flag.reset();

        assert!(!flag.is_cancelled());
        assert!(flag.reason().is_none());
    }
}

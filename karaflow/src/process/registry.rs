//! Registry of running stage processes.

use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::process::Command;
use tracing::{debug, warn};

/// Tracks the pid of every currently running external process so an
/// out-of-band cancellation request can terminate all of them.
///
/// Known limitation: termination is best-effort OS-level process control.
/// Stages are spawned as process-group leaders and the whole group is
/// signalled, but a descendant that moved itself into a new group escapes
/// the signal and may linger as a zombie. [`ProcessRegistry::cancel_all`]
/// therefore clears the registry regardless of individual kill outcomes
/// rather than pretending every resource was reclaimed.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: Mutex<HashMap<u32, String>>,
}

impl ProcessRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a pid under the stage that spawned it. Returns false if
    /// the pid was already registered (handles are never registered twice).
    pub fn register(&self, pid: u32, stage: &str) -> bool {
        let mut processes = self.processes.lock();
        if processes.contains_key(&pid) {
            warn!(pid, stage, "pid already registered");
            return false;
        }
        debug!(pid, stage, "registered stage process");
        processes.insert(pid, stage.to_string());
        true
    }

    /// Removes a pid. Removing an unknown pid is a no-op.
    pub fn unregister(&self, pid: u32) -> bool {
        let removed = self.processes.lock().remove(&pid);
        if let Some(stage) = &removed {
            debug!(pid, stage = %stage, "unregistered stage process");
        }
        removed.is_some()
    }

    /// The pids currently registered.
    #[must_use]
    pub fn registered_pids(&self) -> Vec<u32> {
        self.processes.lock().keys().copied().collect()
    }

    /// The number of registered processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.lock().len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.lock().is_empty()
    }

    /// Attempts to terminate the process tree rooted at every registered
    /// pid, then clears the registry regardless of individual outcomes.
    /// Signalling a pid that already exited is a no-op. Returns the number
    /// of pids that were signalled.
    pub async fn cancel_all(&self) -> usize {
        let snapshot: Vec<(u32, String)> = {
            let mut processes = self.processes.lock();
            processes.drain().collect()
        };

        for (pid, stage) in &snapshot {
            debug!(pid, stage = %stage, "terminating stage process tree");
            kill_tree(*pid).await;
        }

        snapshot.len()
    }
}

/// Best-effort kill of the process tree rooted at `pid`.
#[cfg(unix)]
async fn kill_tree(pid: u32) {
    // Stages are spawned as group leaders, so signalling the negative pid
    // reaches the whole tree.
    let group = format!("-{pid}");
    let status = Command::new("kill")
        .args(["-9", "--", group.as_str()])
        .status()
        .await;

    match status {
        Ok(s) if s.success() => {}
        _ => {
            // The pid may not lead a group (or may already be gone); fall
            // back to signalling it directly and tolerate failure.
            let _ = Command::new("kill")
                .args(["-9", pid.to_string().as_str()])
                .status()
                .await;
        }
    }
}

/// Best-effort kill of the process tree rooted at `pid`.
#[cfg(windows)]
async fn kill_tree(pid: u32) {
    let _ = Command::new("taskkill")
        .args(["/F", "/T", "/PID", pid.to_string().as_str()])
        .status()
        .await;
}

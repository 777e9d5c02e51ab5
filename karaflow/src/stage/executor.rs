//! Spawns one external process per stage and resolves its contract.

use crate::errors::StageFailure;
use crate::process::ProcessRegistry;
use crate::progress::{ProgressBroadcaster, ProgressEvent, ProgressSignal};
use crate::stage::{InputSource, StageSpec};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

/// A byte stream piped into a stage's stdin.
pub type StageFeed = Box<dyn AsyncRead + Send + Unpin>;

/// A successfully completed stage.
#[derive(Debug, Clone)]
pub struct StageSuccess {
    /// The stage that completed.
    pub stage: String,
    /// The artifact it produced.
    pub output_path: PathBuf,
}

/// Runs stages: spawn, track, pump output, resolve.
///
/// The executor owns no per-job state; the registry and broadcaster are
/// injected so tests can observe both sides of the contract.
pub struct StageExecutor {
    registry: Arc<ProcessRegistry>,
    broadcaster: Arc<ProgressBroadcaster>,
}

impl StageExecutor {
    /// Creates an executor wired to the given registry and broadcaster.
    #[must_use]
    pub fn new(registry: Arc<ProcessRegistry>, broadcaster: Arc<ProgressBroadcaster>) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Executes one stage to completion.
    ///
    /// The child's pid is registered immediately after spawn, before any
    /// output is consumed, so there is no window where a running process is
    /// unkillable. Both output channels are scanned line-by-line for
    /// progress markers; non-matching lines are forwarded verbatim as
    /// diagnostics. The stage succeeds only if the process exits zero *and*
    /// its expected artifact exists on disk.
    ///
    /// # Errors
    ///
    /// Returns a [`StageFailure`] describing the spawn error, non-zero
    /// exit, or missing artifact.
    pub async fn run(
        &self,
        spec: &StageSpec,
        feed: Option<StageFeed>,
    ) -> Result<StageSuccess, StageFailure> {
        if spec.input == InputSource::Stdin && feed.is_none() {
            let missing = std::io::Error::other("stage requires an input stream");
            return Err(StageFailure::spawn(&spec.name, &spec.program, &missing));
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(if feed.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Each stage leads its own process group so cancellation can signal
        // the whole tree it spawns.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| StageFailure::spawn(&spec.name, &spec.program, &e))?;

        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.register(pid, &spec.name);
        }
        info!(stage = %spec.name, pid, "stage process started");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Both channels share the dedupe state so an unchanged mapped
        // percent is broadcast only once regardless of which channel
        // carried it.
        let last_mapped: Mutex<Option<u8>> = Mutex::new(None);

        let feed_task = async {
            if let (Some(mut stdin), Some(mut reader)) = (stdin, feed) {
                // The child may exit before the stream is drained; a broken
                // pipe here is resolved by the exit status below.
                let _ = tokio::io::copy(&mut reader, &mut stdin).await;
                let _ = stdin.shutdown().await;
            }
        };
        let stdout_task = async {
            if let Some(stdout) = stdout {
                self.pump_lines(stdout, spec, &last_mapped).await;
            }
        };
        let stderr_task = async {
            if let Some(stderr) = stderr {
                self.pump_lines(stderr, spec, &last_mapped).await;
            }
        };

        tokio::join!(feed_task, stdout_task, stderr_task);

        let status = child.wait().await;
        if let Some(pid) = pid {
            self.registry.unregister(pid);
        }

        // A wait failure leaves the exit status unknowable; treat it like a
        // killed process.
        let status =
            status.map_err(|_| StageFailure::non_zero_exit(&spec.name, None))?;

        if !status.success() {
            return Err(StageFailure::non_zero_exit(&spec.name, status.code()));
        }

        let produced = tokio::fs::try_exists(&spec.expected_output)
            .await
            .unwrap_or(false);
        if !produced {
            return Err(StageFailure::missing_artifact(
                &spec.name,
                &spec.expected_output,
            ));
        }

        info!(stage = %spec.name, output = %spec.expected_output.display(), "stage completed");
        Ok(StageSuccess {
            stage: spec.name.clone(),
            output_path: spec.expected_output.clone(),
        })
    }

    /// Reads one output channel line-by-line, broadcasting normalized
    /// progress for marker lines and the raw text for everything else.
    async fn pump_lines<R>(&self, reader: R, spec: &StageSpec, last_mapped: &Mutex<Option<u8>>)
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match spec.pattern.parse(&line) {
                Some(signal) => {
                    let (raw, mapped) = match signal {
                        ProgressSignal::Percent(raw) => (raw, spec.progress.map(raw)),
                        ProgressSignal::Complete => (100, spec.progress.end),
                    };
                    let changed = {
                        let mut last = last_mapped.lock();
                        if *last == Some(mapped) {
                            false
                        } else {
                            *last = Some(mapped);
                            true
                        }
                    };
                    if changed {
                        let event = ProgressEvent {
                            stage: spec.name.clone(),
                            raw_percent: raw,
                            mapped_percent: mapped,
                            raw_text: line,
                        };
                        debug!(
                            stage = %event.stage,
                            raw = event.raw_percent,
                            mapped = event.mapped_percent,
                            "progress"
                        );
                        self.broadcaster.broadcast(&event.log_line());
                    }
                }
                None => {
                    if !line.trim().is_empty() {
                        self.broadcaster.broadcast(&line);
                    }
                }
            }
        }
    }
}

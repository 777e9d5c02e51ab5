//! Source provider backed by the yt-dlp binary.

use crate::errors::EngineError;
use crate::source::{validate_url, AudioReader, SourceInfo, SourceProvider};
use async_trait::async_trait;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// Resolves metadata with `yt-dlp -J` and streams audio with `yt-dlp -o -`.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    bin: String,
}

impl YtDlpProvider {
    /// Creates a provider using the given yt-dlp binary.
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

#[async_trait]
impl SourceProvider for YtDlpProvider {
    async fn resolve(&self, url: &str) -> Result<SourceInfo, EngineError> {
        validate_url(url)?;

        let output = Command::new(&self.bin)
            .args(["-J", "--no-warnings", url])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::source_fetch(format!("failed to run {}: {e}", self.bin)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::source_fetch(format!(
                "metadata lookup failed: {}",
                stderr.lines().last().unwrap_or("unknown error")
            )));
        }

        let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::source_fetch(format!("unparseable metadata: {e}")))?;

        let id = metadata["id"]
            .as_str()
            .ok_or_else(|| EngineError::source_fetch("metadata carries no source id"))?
            .to_string();
        debug!(id = %id, "resolved source metadata");

        Ok(SourceInfo {
            id,
            title: metadata["title"].as_str().unwrap_or_default().to_string(),
            channel: metadata["channel"]
                .as_str()
                .or_else(|| metadata["uploader"].as_str())
                .unwrap_or_default()
                .to_string(),
            thumbnail_url: metadata["thumbnail"].as_str().map(ToString::to_string),
            duration_seconds: metadata["duration"].as_u64().unwrap_or(0),
        })
    }

    async fn open_audio(&self, url: &str) -> Result<AudioReader, EngineError> {
        validate_url(url)?;

        let mut child = Command::new(&self.bin)
            .args(["-f", "bestaudio", "-o", "-", "--quiet", "--no-warnings", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::source_fetch(format!("failed to run {}: {e}", self.bin)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::source_fetch("audio stream has no stdout"))?;

        Ok(Box::new(ChildAudioReader {
            _child: child,
            stdout,
        }))
    }
}

/// Keeps the downloader process alive for as long as its output is being
/// read; `kill_on_drop` reaps it when the reader is dropped early.
struct ChildAudioReader {
    _child: Child,
    stdout: ChildStdout,
}

impl AsyncRead for ChildAudioReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.get_mut().stdout).poll_read(cx, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_rejects_invalid_url_without_spawning() {
        // The binary does not exist; an invalid URL must fail before any
        // spawn is attempted.
        let provider = YtDlpProvider::new("definitely-not-a-real-binary");
        let err = provider.resolve("::junk::").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_source_fetch_error() {
        let provider = YtDlpProvider::new("definitely-not-a-real-binary");
        let err = provider
            .resolve("https://example.com/watch?v=abc")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SourceFetch { .. }));
    }
}

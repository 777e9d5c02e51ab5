//! Upstream source resolution.
//!
//! The engine treats metadata lookup and audio retrieval as an external
//! collaborator behind [`SourceProvider`], so the pipeline can be tested
//! against an in-memory provider and deployed against yt-dlp.

mod thumbnail;
mod ytdlp;

pub use thumbnail::fetch_thumbnail;
pub use ytdlp::YtDlpProvider;

use crate::errors::EngineError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

/// A byte reader over the source's best audio track.
pub type AudioReader = Box<dyn AsyncRead + Send + Unpin>;

/// Metadata for a resolved source URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// A stable identifier for the source.
    pub id: String,
    /// The source title.
    pub title: String,
    /// The channel or uploader name.
    pub channel: String,
    /// A thumbnail image URL, when the source has one.
    pub thumbnail_url: Option<String>,
    /// Duration in seconds.
    pub duration_seconds: u64,
}

/// Resolves URLs into metadata and streamable audio.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Validates the URL and returns its metadata.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidUrl`] for malformed or unsupported URLs (and
    /// nothing is spawned in that case); [`EngineError::SourceFetch`] when
    /// the upstream lookup fails.
    async fn resolve(&self, url: &str) -> Result<SourceInfo, EngineError>;

    /// Opens a byte stream over the source's audio track, suitable for
    /// piping into the transcode stage's stdin.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`SourceProvider::resolve`].
    async fn open_audio(&self, url: &str) -> Result<AudioReader, EngineError>;
}

/// Cheap syntactic validation applied before anything is spawned: the URL
/// must parse and carry an http(s) scheme and a host.
pub fn validate_url(url: &str) -> Result<(), EngineError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| EngineError::invalid_url(url))?;
    let scheme_ok = parsed.scheme() == "http" || parsed.scheme() == "https";
    if !scheme_ok || parsed.host_str().is_none() {
        return Err(EngineError::invalid_url(url));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_https() {
        assert!(validate_url("https://www.youtube.com/watch?v=abc123").is_ok());
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(matches!(
            validate_url("not a url at all"),
            Err(EngineError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_schemes() {
        assert!(validate_url("file:///etc/passwd").is_err());
        assert!(validate_url("ftp://example.com/a").is_err());
    }
}

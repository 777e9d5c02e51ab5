//! Streaming thumbnail download.

use crate::errors::EngineError;
use futures::StreamExt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Streams a thumbnail image to `dest`.
///
/// A non-success upstream status is tolerated: the function returns
/// `Ok(false)` and the pipeline proceeds without a thumbnail. Only
/// transport and filesystem errors surface as `Err`, and callers treat
/// those as non-fatal too.
///
/// # Errors
///
/// [`EngineError::SourceFetch`] on transport failure, [`EngineError::Io`]
/// if the destination cannot be written.
pub async fn fetch_thumbnail(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
) -> Result<bool, EngineError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| EngineError::source_fetch(format!("thumbnail request failed: {e}")))?;

    if !response.status().is_success() {
        warn!(status = %response.status(), url, "thumbnail unavailable, continuing without it");
        return Ok(false);
    }

    let mut stream = response.bytes_stream();
    let mut file = tokio::fs::File::create(dest).await?;
    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| EngineError::source_fetch(format!("thumbnail stream failed: {e}")))?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    info!(path = %dest.display(), "thumbnail saved");
    Ok(true)
}

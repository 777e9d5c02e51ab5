//! Request routing and response shaping.

use hyper::body::Bytes;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use karaflow::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Body of the karaoke and info endpoints.
#[derive(Debug, Deserialize)]
struct JobRequest {
    url: String,
    #[serde(default)]
    mode: Option<String>,
}

impl JobRequest {
    /// `"audio"` selects the instrumental-only pipeline; anything else (the
    /// default included) produces the captioned video.
    fn kind(&self) -> JobKind {
        match self.mode.as_deref() {
            Some("audio") => JobKind::AudioOnly,
            _ => JobKind::FullVideo,
        }
    }
}

/// Dispatches one request against the engine.
pub async fn handle(
    req: Request<Body>,
    controller: Arc<PipelineController>,
) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/api/progress") => Ok(progress_stream(&controller)),
        (&Method::POST, "/api/video/karaoke") => run_karaoke(req, &controller).await,
        (&Method::POST, "/api/video/info") => video_info(req, &controller).await,
        (&Method::POST, "/api/video/cancel") => Ok(cancel(&controller).await),
        (&Method::POST, "/api/video/delete-temp") => Ok(delete_temp(&controller).await),
        (&Method::POST, "/api/video/delete") => Ok(delete_final(&controller).await),
        (&Method::GET, "/api/video/final") => {
            Ok(serve_artifact(controller.final_video_path(), "video/mp4").await)
        }
        _ => Ok(json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Not found." }),
        )),
    }
}

/// Long-lived `text/event-stream` of progress lines. One subscriber per
/// connection; the subscription is dropped when the client disconnects.
fn progress_stream(controller: &Arc<PipelineController>) -> Response<Body> {
    let broadcaster = controller.broadcaster().clone();
    let (id, mut rx) = broadcaster.subscribe();
    let (mut sender, body) = Body::channel();

    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let frame = format!("data: {}\n\n", json!({ "log": line }));
            if sender.send_data(Bytes::from(frame)).await.is_err() {
                debug!(subscriber = id, "progress stream client disconnected");
                break;
            }
        }
        broadcaster.unsubscribe(id);
    });

    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

async fn run_karaoke(
    req: Request<Body>,
    controller: &Arc<PipelineController>,
) -> Result<Response<Body>, hyper::Error> {
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let Ok(request) = serde_json::from_slice::<JobRequest>(&body) else {
        return Ok(json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Request body must include a url." }),
        ));
    };

    let kind = request.kind();
    match controller.run(&request.url, kind).await {
        Ok(outcome) => Ok(serve_artifact(outcome.final_path, kind.content_type()).await),
        Err(e) => Ok(json_response(error_status(&e), &e.to_json())),
    }
}

async fn video_info(
    req: Request<Body>,
    controller: &Arc<PipelineController>,
) -> Result<Response<Body>, hyper::Error> {
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let Ok(request) = serde_json::from_slice::<JobRequest>(&body) else {
        return Ok(json_response(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "Request body must include a url." }),
        ));
    };

    match controller.source().resolve(&request.url).await {
        Ok(info) => Ok(json_response(
            StatusCode::OK,
            &json!({
                "title": info.title,
                "channel": info.channel,
                "thumbnail": info.thumbnail_url,
                "duration": info.duration_seconds,
            }),
        )),
        Err(e) => Ok(json_response(error_status(&e), &e.to_json())),
    }
}

async fn cancel(controller: &Arc<PipelineController>) -> Response<Body> {
    let signalled = controller.cancel().await;
    let message = if signalled > 0 {
        "Processing successfully cancelled."
    } else {
        "No process is currently running."
    };
    json_response(StatusCode::OK, &json!({ "message": message }))
}

async fn delete_temp(controller: &Arc<PipelineController>) -> Response<Body> {
    let removed = controller.delete_all_artifacts().await;
    json_response(
        StatusCode::OK,
        &json!({ "message": format!("Deleted {} temporary file(s).", removed.len()) }),
    )
}

async fn delete_final(controller: &Arc<PipelineController>) -> Response<Body> {
    match controller.delete_final_video().await {
        Ok(true) => json_response(StatusCode::OK, &json!({ "message": "Video deleted." })),
        Ok(false) => json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Video not found." }),
        ),
        Err(e) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({ "error": e.to_string() }),
        ),
    }
}

/// Streams a file as the response body, or a 404 JSON body if it is absent.
async fn serve_artifact(path: PathBuf, content_type: &'static str) -> Response<Body> {
    let Ok(mut file) = tokio::fs::File::open(&path).await else {
        return json_response(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Video not found." }),
        );
    };

    let (mut sender, body) = Body::channel();
    tokio::spawn(async move {
        let mut buffer = vec![0u8; 64 * 1024];
        loop {
            match file.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if sender
                        .send_data(Bytes::copy_from_slice(&buffer[..n]))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            }
        }
    });

    let mut response = Response::new(body);
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Body> {
    let mut response = Response::new(Body::from(value.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn error_status(error: &EngineError) -> StatusCode {
    match error {
        EngineError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        EngineError::Busy => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_request_defaults_to_full_video() {
        let request: JobRequest = serde_json::from_str(r#"{"url": "https://x"}"#).unwrap();
        assert_eq!(request.kind(), JobKind::FullVideo);
    }

    #[test]
    fn test_job_request_audio_mode() {
        let request: JobRequest =
            serde_json::from_str(r#"{"url": "https://x", "mode": "audio"}"#).unwrap();
        assert_eq!(request.kind(), JobKind::AudioOnly);
    }

    #[test]
    fn test_job_request_requires_url() {
        assert!(serde_json::from_str::<JobRequest>(r"{}").is_err());
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&EngineError::invalid_url("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(error_status(&EngineError::Busy), StatusCode::CONFLICT);
        assert_eq!(
            error_status(&EngineError::source_fetch("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_serve_artifact_missing_file_is_404() {
        let response = serve_artifact(PathBuf::from("/nonexistent/final.mp4"), "video/mp4").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_artifact_streams_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("final.mp4");
        tokio::fs::write(&path, b"mp4 bytes").await.unwrap();

        let response = serve_artifact(path, "video/mp4").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            &HeaderValue::from_static("video/mp4")
        );

        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"mp4 bytes");
    }
}

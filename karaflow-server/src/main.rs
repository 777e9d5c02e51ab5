//! HTTP adapter for the karaflow pipeline engine.

mod routes;

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use karaflow::prelude::*;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env();
    let address = config.bind_addr;
    let provider = Arc::new(YtDlpProvider::new(config.ytdlp_bin.clone()));
    let controller = Arc::new(PipelineController::new(
        config,
        provider,
        Arc::new(ProcessRegistry::new()),
        Arc::new(ProgressBroadcaster::new()),
    ));

    let make_svc = make_service_fn(move |_| {
        let controller = controller.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let controller = controller.clone();
                async move { routes::handle(req, controller).await }
            }))
        }
    });

    let server = hyper::Server::try_bind(&address)?.serve(make_svc);
    info!(address = %address, "karaflow server listening");

    let graceful = server.with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    });
    graceful.await?;

    Ok(())
}

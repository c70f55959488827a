//! HTTP server startup and graceful shutdown

use anyhow::Result;
use axum::Router;
use packetized_core::Config;
use packetized_worker::TranscodeJobQueue;

use crate::constants::API_VERSION;

/// Serve `app` until Ctrl+C or SIGTERM, then stop the transcode worker pool.
///
/// Jobs still queued or running are not awaited. Their assets stay non-terminal
/// and are re-dispatched at the next startup.
pub async fn start_server(config: &Config, app: Router, job_queue: &TranscodeJobQueue) -> Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port());
    tracing::info!(addr = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        version = API_VERSION,
        max_upload_mb = config.max_upload_size_bytes() / 1024 / 1024,
        max_concurrent_jobs = config.max_concurrent_jobs(),
        job_queue_size = config.job_queue_size(),
        ffmpeg_path = %config.pipeline().ffmpeg_path,
        "Server ready and accepting connections"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    job_queue.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Signal handler for graceful shutdown
///
/// # Panics
/// Panics if the Ctrl+C or (on Unix) SIGTERM handler cannot be installed.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}

//! yt-audio - HTTP service that streams the best audio track of a video URL
//!
//! POST /extract-audio runs yt-dlp in a per-request temp directory and streams
//! the downloaded audio back to the caller.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt_audio::services::{Extractor, YtDlpExtractor};
use yt_audio::{AppState, Config, build_app};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "yt_audio=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env()?;
    info!(
        workspace_root = %config.workspace_root.display(),
        max_concurrent_extractions = config.max_concurrent_extractions,
        "Configuration loaded"
    );

    let extractor = Arc::new(YtDlpExtractor::new(config.ytdlp_path.clone()));
    let probe = extractor.clone();
    if !tokio::task::spawn_blocking(move || probe.is_available()).await? {
        warn!(
            ytdlp_path = %config.ytdlp_path,
            "yt-dlp is not available - extraction requests will fail"
        );
    }

    let addr = config.bind_addr();
    let state = AppState::new(config, extractor);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum::serve")?;

    info!("yt-audio stopped");
    Ok(())
}

/// Wait for Ctrl-C or, on unix, SIGTERM. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let signal = tokio::select! {
        _ = interrupt() => "SIGINT",
        _ = terminate() => "SIGTERM",
    };
    info!(signal, "Shutting down, waiting for in-flight extractions");
}

async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(e) => {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    let Ok(mut sigterm) = signal(SignalKind::terminate())
        .inspect_err(|e| warn!(error = %e, "SIGTERM handler unavailable"))
    else {
        return std::future::pending().await;
    };
    sigterm.recv().await;
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending().await
}

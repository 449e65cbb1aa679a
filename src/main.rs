//! Rift Replay Server - match timeline playback service
//!
//! Entry point. It serves:
//! - HTTP endpoints for match resolution and derived replay data
//! - WebSocket playback sessions that stream interpolated snapshots

mod app;
mod config;
mod http;
mod replay;
mod upstream;
mod util;
mod ws;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    init_tracing(&config.log_level);
    init_server_time();

    info!(
        addr = %config.server_addr,
        landmark_store = %config.landmark_store_path.display(),
        api_key = config.riot_api_key.is_some(),
        "Starting Rift Replay Server"
    );

    let state = AppState::new(config.clone());
    // Kept past serve() for the final model write
    let landmarks = state.landmarks.clone();
    let router = build_router(state);

    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}/api and ws://{}/ws", addr, addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    landmarks.flush();
    info!(sites = landmarks.site_count(), "Landmark model flushed, server stopped");
    Ok(())
}

/// `RUST_LOG` wins; otherwise this crate logs at `log_level` and HTTP plumbing at info
fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rift_replay_server={log_level},tower_http=info,info"))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}

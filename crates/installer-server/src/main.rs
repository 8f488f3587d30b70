//! `installer` binary: serve install scripts over HTTP.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use installer_server::{AppState, Cli, ServerConfig, router, spawn_purge};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::from(Cli::parse());
    let addr = config.addr();
    if config.token.is_none() {
        info!("no GitHub token configured, upstream requests are rate limited");
    }

    let state = AppState::new(config)?;
    spawn_purge(Arc::clone(state.resolver.cache()));

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

fn init_tracing() {
    // targets match by prefix, so this covers installer_core and installer_server too
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("installer=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

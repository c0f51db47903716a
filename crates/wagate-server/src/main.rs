//! wagate server
//!
//! Keeps one WhatsApp Web session alive behind an HTTP control API. Viewers
//! watching `/ws` see pairing progress (QR, loading, ready) in real time;
//! trusted callers send messages, log out and restart through the REST routes.
//!
//! The session itself runs in a sidecar process (see `sidecar/`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use wagate_core::Coordinator;
use wagate_server::config::{ServerArgs, ServerConfig};
use wagate_server::gateway;
use wagate_server::logging;
use wagate_server::sidecar::SidecarFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    logging::init(args.log_json);
    logging::install_panic_hook();

    let config = ServerConfig::from_args(args).context("invalid configuration")?;

    info!("wagate server v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        sidecar = %config.sidecar.program,
        session_dir = %config.sidecar.session_dir.display(),
        "Session client: sidecar process"
    );

    let factory = Arc::new(SidecarFactory::new(config.sidecar.clone()));
    let coordinator = Coordinator::new(factory, config.coordinator.clone());
    let router = gateway::build_router(coordinator.clone(), &config.cors_origins);

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    coordinator.initialize().await;

    if config.open_browser {
        let url = format!("http://{}", config.addr);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                warn!("Could not open browser at {}: {}", url, e);
            }
        });
    }

    gateway::serve(listener, router, gateway::shutdown_signal())
        .await
        .context("gateway server failed")?;

    info!("Shutting down, destroying session client...");
    coordinator.shutdown().await;
    info!("wagate server stopped");
    Ok(())
}

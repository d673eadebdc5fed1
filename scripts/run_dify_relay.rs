//! Dify relay server
//!
//! Usage:
//! ```bash
//! run-dify-relay --host 0.0.0.0 --port 8787
//! DIFY_RELAY_UPSTREAM_TIMEOUT_SECS=30 run-dify-relay --log-level debug
//! ```

use anyhow::Context;
use clap::Parser;
use dify_relay_adaptor_web::RelayServer;
use dify_relay_core::{init_logging, load_env, RelayConfig};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "run-dify-relay")]
#[command(about = "Server-side relay between a browser chat client and Dify")]
struct Cli {
    /// Host to bind to
    #[arg(long, env = "DIFY_RELAY_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "DIFY_RELAY_PORT")]
    port: Option<u16>,

    /// Log filter, e.g. `info` or `dify_relay_core=debug`
    #[arg(long, env = "DIFY_RELAY_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Alternate .env file
    #[arg(long)]
    env_file: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    std::env::set_var("DIFY_RELAY_LOG_LEVEL", &cli.log_level);
    init_logging();

    match &cli.env_file {
        Some(path) => dify_relay_core::load_env_from_path(path)?,
        None => load_env()?,
    }

    let mut config = RelayConfig::from_env();
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    match config.upstream_timeout {
        Some(timeout) => info!("Upstream timeout: {}s", timeout.as_secs()),
        None => warn!("Upstream timeout disabled"),
    }

    let mut server = RelayServer::new(config).context("failed to build relay server")?;
    let addr = server.start().await.context("failed to start relay server")?;
    info!("Dify relay listening on http://{}", addr);

    shutdown_signal().await;
    server.stop().await?;
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = async {
            #[cfg(unix)]
            if let Some(ref mut s) = term {
                s.recv().await;
                return;
            }
            std::future::pending::<()>().await
        } => {},
    }
    info!("Shutdown signal received");
}

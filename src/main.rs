//! marker-proxy entry point.
//!
//! Loads the configuration, binds the listener and serves until Ctrl+C.

use std::path::PathBuf;

use clap::Parser;

use marker_proxy::config::{read_config, validate_config, ConfigError};
use marker_proxy::net::Listener;
use marker_proxy::observability::init_logging;
use marker_proxy::{ProxyServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "marker-proxy")]
#[command(about = "Forward proxy that relays one upstream and marks words in HTML", long_about = None)]
struct Cli {
    /// Configuration file (TOML, or JSON by extension).
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    /// Override the upstream base URL.
    #[arg(short, long)]
    upstream: Option<String>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = read_config(&cli.config)?;
    if let Some(upstream) = cli.upstream {
        config.upstream.base_url = upstream;
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    let level = cli
        .log_level
        .as_deref()
        .unwrap_or(&config.observability.log_level)
        .to_string();
    init_logging(&level);

    tracing::info!(
        config = %cli.config.display(),
        listen = %config.proxy_authority(),
        upstream = %config.upstream.base_url,
        "marker-proxy v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let listener = Listener::bind(&config.listener).await?;
    let server = ProxyServer::new(config)?;

    let shutdown = Shutdown::new();
    shutdown.trigger_on_ctrl_c();
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

//! Pilot - Main entry point

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use pilot_foundation::PilotConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pilot - autonomous agent task server
#[derive(Parser, Debug)]
#[command(name = "pilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (default: <config_dir>/pilot/config.toml)
    #[arg(short, long, env = "PILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long, env = "PILOT_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PILOT_PORT")]
    port: Option<u16>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { args.log_level.as_str() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let mut config = PilotConfig::load(args.config.as_deref()).context("Failed to load config")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    pilot_server::start_server(config).await
}

//! fwd forwarder
//!
//! Transparent L4 forwarder to one fixed backend.
//!
//! This binary:
//! - Loads the JSON config document named on the command line
//! - Binds the frontend port on all IPv4 interfaces
//! - Spawns one relay task per accepted client
//! - Relays bytes verbatim until either side closes

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fwd_forwarder::{Listener, ProxyConfig};

/// Forward TCP connections to a single backend.
#[derive(Debug, Parser)]
#[command(name = "forwarder")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the JSON config document.
    config: PathBuf,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Log level used when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, env = "FWD_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.log_format, &cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Initialize tracing (prefer RUST_LOG, fallback to --log-level / FWD_LOG_LEVEL).
fn init_tracing(format: LogFormat, log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ProxyConfig::load(&cli.config)
        .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

    info!(
        frontend_port = config.frontend_port,
        backend_addr = %config.backend_addr,
        connect_timeout_ms = config.connect_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let local_ip =
        fwd_networking::local_ipv4().context("Error getting local host information")?;

    let listener = Listener::bind(&config)
        .await
        .with_context(|| format!("Unable to bind to port {}", config.frontend_port))?;
    let bound = listener.local_addr()?;

    println!(
        "-- Listening for connections on {}:{} --",
        local_ip,
        bound.port()
    );
    println!("Proxying to {} ({})", config.backend_addr, config.note);

    tokio::select! {
        result = listener.run() => result.context("Listener failed")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Unable to listen for shutdown signal")?;
            info!("Shutting down");
        }
    }

    Ok(())
}

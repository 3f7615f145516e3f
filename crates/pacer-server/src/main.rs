//! pacer - paced message dispatch service - Entry Point

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use pacer_server::config::DEFAULT_CONFIG_PATH;
use pacer_server::{AppConfig, Application};
use tracing::{info, warn};

/// Paced message dispatch service
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PACER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Control server port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Determine config path: CLI arg > PACER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PACER_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let config_found = Path::new(&config_path).exists();
    let mut config = if config_found {
        AppConfig::from_file(&config_path)?
    } else {
        AppConfig::default()
    };
    if let Some(port) = args.port {
        config.control.port = port;
    }

    // Initialize logging
    pacer_telemetry::init_logging(config.telemetry.log_filter.as_deref())?;

    info!("Starting pacer v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!(config_path = %config_path, "Configuration loaded");
    } else {
        warn!(config_path = %config_path, "Configuration file not found, using defaults");
    }
    info!(
        bind = %config.control.bind,
        port = config.control.port,
        delay_ms = config.dispatch.delay_ms,
        "Effective configuration"
    );

    let app = Application::new(config)?;
    app.run().await?;

    Ok(())
}

//! ParkHub: headless parking reservation service
//!
//! ```sh
//! # Run with default config (~/.config/parkhub/config.toml)
//! parkhub-service
//!
//! # Custom config path
//! parkhub-service --config /etc/parkhub/config.toml
//!
//! # Validate config without starting
//! parkhub-service --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use parkhub::config::{AppConfig, StorageBackend};
use parkhub::server::{init_tracing, ServerError, ServerHandle, ServerOptions};

/// Parking spot reservation service with live change notifications.
#[derive(Parser, Debug)]
#[command(
    name = "parkhub-service",
    version,
    about = "Parking spot reservation service",
    long_about = "ParkHub: REST API + WebSocket notifications for parking spot reservations.\n\n\
                  Default config: ~/.config/parkhub/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "PARKHUB_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen port.
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Keep everything in memory instead of the configured database.
    #[arg(long)]
    in_memory: bool,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(parkhub::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(mut cfg) => {
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            if cli.check {
                eprintln!("Configuration is invalid: {}", e);
                std::process::exit(1);
            }
            let mut cfg = AppConfig::default();
            if let Some(ref level) = cli.log_level {
                cfg.logging.level = level.clone();
            }
            init_tracing(&cfg);
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
            cfg
        }
    };

    if let Some(port) = cli.port {
        info!("CLI override: port = {}", port);
        config.server.port = port;
    }
    if cli.in_memory {
        info!("CLI override: in-memory storage");
        config.database.backend = StorageBackend::Memory;
    }

    if cli.check {
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}", config.server.address());
        println!("   Storage     : {:?} ({})", config.database.backend, config.database.url);
        println!("   Catalog     : {} spots", config.catalog.spots.len());
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        ..ServerOptions::default()
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

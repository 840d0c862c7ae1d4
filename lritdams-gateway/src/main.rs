//! LRIT-to-DAMS-NT gateway entry point.
//!
//! ```text
//! lritdams-gateway                  Run in the foreground
//! lritdams-gateway --config <path>  Load a custom config TOML
//! lritdams-gateway --lock <path>    Use a custom lock file
//! lritdams-gateway --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lritdams_core::GatewayError;
use lritdams_gateway::config::GatewayConfig;
use lritdams_gateway::service::GatewayService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lritdams-gateway", about = "Relay LRIT DCS files to DAMS-NT subscribers")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "lritdams-gateway.toml")]
    config: PathBuf,

    /// Path to the single-instance lock file.
    #[arg(short, long, default_value = "lritdams-gateway.lock")]
    lock: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&GatewayConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config. Fallbacks are reported once tracing is up.
    let (config, fallback) = GatewayConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.file.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.logging.file)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    }

    info!("lritdams-gateway v{}", env!("CARGO_PKG_VERSION"));
    match fallback {
        None => info!("config: {}", cli.config.display()),
        Some(GatewayError::Connection(_)) => {
            info!("no config at {}; using defaults", cli.config.display())
        }
        Some(e) => warn!("{e}; using defaults"),
    }
    info!("listen: {}", config.listen_addr());
    info!("input dir: {}", config.ingest.input_dir.display());
    match &config.ingest.done_dir {
        Some(dir) => info!("done dir: {}", dir.display()),
        None => info!("processed files are deleted"),
    }
    info!("start pattern: {}", config.damsnt.start_pattern);

    let service = GatewayService::new(config, &cli.config, &cli.lock);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    if let Err(e) = service.run().await {
        error!("fatal: {e}");
        return Err(e.into());
    }

    Ok(())
}

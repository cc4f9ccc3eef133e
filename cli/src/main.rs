//! Texnouz roaming hub: CLI service
//!
//! Headless roaming hub suitable for deployment as a systemd service,
//! Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/texnouz-roaming/config.toml)
//! roaming-service
//!
//! # Custom config path
//! roaming-service --config /etc/texnouz-roaming/config.toml
//!
//! # Validate config without starting
//! roaming-service --check
//!
//! # Write a default config file and exit
//! roaming-service --init
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use texnouz_roaming::config::AppConfig;
use texnouz_roaming::runtime::{init_tracing, RoamingHub};

/// Texnouz roaming hub: propagates charging infrastructure to roaming partners.
#[derive(Parser, Debug)]
#[command(
    name = "roaming-service",
    version,
    about = "Roaming hub for EV charging networks",
    long_about = "Texnouz roaming hub keeps the charging infrastructure of a roaming \
                  network and pushes every change of it to the configured partners.\n\n\
                  Default config: ~/.config/texnouz-roaming/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "ROAMING_CONFIG")]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Override the Prometheus listen address, e.g. 0.0.0.0:9185.
    #[arg(long)]
    metrics_listen: Option<String>,

    /// Validate the configuration file and exit without starting the hub.
    #[arg(long)]
    check: bool,

    /// Write a default configuration file to the config path and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(texnouz_roaming::default_config_path);

    if cli.init {
        AppConfig::default().save(&config_path)?;
        println!("✅ Default configuration written to {}", config_path.display());
        return Ok(());
    }

    // ── Load configuration ─────────────────────────────────────
    let (mut config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(ref listen) = cli.metrics_listen {
        config.metrics.listen = Some(listen.clone());
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        if let Some(e) = load_error {
            eprintln!("❌ {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
        config.validate()?;
        println!("✅ Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   Network     : {} ({})", config.network.id, config.network.name);
        println!("   Hub id      : {}", config.network.hub_id);
        println!("   Adapters    : {}", config.adapters.len());
        for adapter in &config.adapters {
            println!(
                "     - {} ({:?}{})",
                adapter.id,
                adapter.kind,
                if adapter.deferred { ", deferred" } else { "" }
            );
        }
        println!("   Queue       : {}", if config.queue.enabled { "enabled" } else { "disabled" });
        println!("   Metrics     : {}", config.metrics.listen.as_deref().unwrap_or("not exported"));
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => {
            error!("Failed to load config from {}: {}", config_path.display(), e);
            error!("Using default configuration.");
        }
    }

    // ── Prometheus exporter ────────────────────────────────────
    if let Some(ref listen) = config.metrics.listen {
        let addr: SocketAddr = listen.parse()?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!("📊 Prometheus metrics available at http://{}/metrics", addr);
    }

    // ── Start hub ──────────────────────────────────────────────
    let hub = RoamingHub::start(config)?;

    // Install OS signal handlers (SIGTERM, SIGINT)
    hub.install_signal_handler();

    info!("🚀 Press Ctrl+C to shutdown gracefully.");

    // Wait for shutdown signal, then drain the queues
    hub.shutdown_signal().cancelled().await;
    hub.wait().await;

    Ok(())
}

//! Network configuration service.
//!
//! # Architecture Overview
//!
//! ```text
//!   HTTP client                                     host networking
//!       │                                                 ▲
//!       ▼                                                 │
//!  ┌──────────┐    ┌───────────────────┐    ┌─────────────┴──┐
//!  │   http   │───▶│ ConfigAuthority   │───▶│ backend (nmcli │
//!  │  server  │    │  registry + policy│    │  or dry run)   │
//!  └──────────┘    └─────────▲─────────┘    └─────────┬──────┘
//!                            │ status                  │ probe
//!                      ┌─────┴──────┐                  │
//!                      │  monitor   │◀─────────────────┘
//!                      │ + hotspot  │
//!                      └────────────┘
//!
//!  lifecycle: config watcher → supervisor (Active ⇄ Inactive) → shutdown
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use network_conf_server::config::{ConfigSources, ConfigWatcher, DEFAULTS_FILE};
use network_conf_server::lifecycle::{self, Shutdown, Supervisor};
use network_conf_server::monitor::StatusMonitor;
use network_conf_server::observability;

#[derive(Parser)]
#[command(name = "network-conf-server")]
#[command(about = "HTTP API for host network interface configuration", long_about = None)]
struct Args {
    /// Configuration file overlaid on the defaults file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Defaults file.
    #[arg(long, default_value = DEFAULTS_FILE)]
    defaults: PathBuf,

    /// Do not reload the configuration when the files change.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let sources = ConfigSources::new(Some(args.defaults.clone()), args.config.clone());
    let config = sources.load()?;

    observability::init_logging(
        &config.observability.log_level,
        config.observability.json_logs,
    )?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "network-conf-server starting");
    tracing::info!(
        defaults = %args.defaults.display(),
        config = ?args.config,
        backend = ?config.interfaces.backend,
        enable_server = config.server.enable_server,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let backend = lifecycle::build_backend(&config);
    let startup_config = config.clone();
    let bootstrap =
        tokio::task::spawn_blocking(move || lifecycle::bootstrap(&startup_config, backend))
            .await??;

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_handler(shutdown.clone());

    let monitor = StatusMonitor::new(
        bootstrap.authority.clone(),
        bootstrap.source.clone(),
        Duration::from_secs(config.interfaces.update_period_secs),
        bootstrap.ap_device.clone(),
        &config.ap,
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown.clone()));

    // Keeps the file watch alive for the life of the process.
    let (_watcher, updates) = if args.no_watch {
        (None, None)
    } else {
        let (watcher, updates) = ConfigWatcher::new(sources);
        match watcher.run() {
            Ok(guard) => (Some(guard), Some(updates)),
            Err(e) => {
                tracing::warn!(error = %e, "Config watcher unavailable, reload disabled");
                (None, None)
            }
        }
    };

    Supervisor::new(bootstrap.authority, config, updates, shutdown.clone())
        .run()
        .await?;

    shutdown.trigger();
    let _ = monitor_handle.await;
    tracing::info!("Shutdown complete");
    Ok(())
}

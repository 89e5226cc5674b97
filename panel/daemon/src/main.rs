//! homepanel - Home Status Display Daemon
//!
//! Polls the home-automation hub, an RSS feed, a weather service, the host
//! and a temperature/humidity sensor, and pages the results onto a 20x4
//! character display. Three buttons switch between clock, news ticker and
//! statistics/weather.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (~/.config/homepanel/homepanel.toml if present)
//! homepanel
//!
//! # With config file
//! homepanel --config /etc/homepanel/homepanel.toml
//!
//! # Debug logging
//! homepanel -v
//! RUST_LOG=panel_core=trace homepanel
//!
//! # Buttons from a GPIO helper (one event per line: 0, 1, 2 or m)
//! gpio-events | homepanel
//! ```
//!
//! # Signals
//!
//! - `SIGTERM` / `SIGINT`: Blank the display and exit

mod app;
mod input;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::runtime::Runtime;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::info;

use panel_core::{load_config, load_config_from_path, ConfigOverrides, PanelConfig};

use app::PanelDaemon;

/// How long shutdown waits for blocking-pool threads, such as a parked stdin read
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// homepanel - home status pages on a character LCD
#[derive(Parser, Debug)]
#[command(name = "homepanel")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "HOMEPANEL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// RSS feed URL
    #[arg(long, value_name = "URL")]
    feed_url: Option<String>,

    /// Hub XML API URL
    #[arg(long, value_name = "URL")]
    hub_url: Option<String>,

    /// Seconds each page is shown
    #[arg(long, value_name = "SECS")]
    refresh_secs: Option<u64>,

    /// IIO directory of the temperature/humidity sensor
    #[arg(long, value_name = "DIR")]
    sensor_dir: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(ref url) = self.feed_url {
            overrides = overrides.with_feed_url(url.clone());
        }
        if let Some(ref url) = self.hub_url {
            overrides = overrides.with_hub_url(url.clone());
        }
        if let Some(secs) = self.refresh_secs {
            overrides = overrides.with_refresh_secs(secs);
        }
        if let Some(ref dir) = self.sensor_dir {
            overrides = overrides.with_sensor_dir(dir.clone());
        }
        overrides
    }
}

/// Initialize logging; `RUST_LOG` takes precedence over `--verbose`
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("homepanel={level},panel_core={level}"))
    });

    // stdout belongs to the console display
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the configuration file, environment and CLI overrides
fn resolve_config(args: &Args) -> Result<PanelConfig> {
    let mut config = match args.config {
        Some(ref path) => {
            if !path.exists() {
                anyhow::bail!("Config file {} does not exist", path.display());
            }
            load_config_from_path(Some(path.clone()))
        }
        None => load_config(),
    }
    .context("Failed to load configuration")?;

    args.overrides().apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        source = %config.source(),
        path = ?config.config_file_path,
        "Configuration loaded"
    );
    Ok(config)
}

fn build_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Stop the runtime without waiting on reads that never complete
fn shutdown_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    info!("homepanel starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = resolve_config(&args)?;
    let runtime = build_runtime()?;
    let result = runtime.block_on(serve(config));
    shutdown_runtime(runtime);

    if result.is_ok() {
        info!("homepanel stopped cleanly");
    }
    result
}

/// Run the panel until SIGTERM or SIGINT
async fn serve(config: PanelConfig) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let shutdown = Arc::new(Notify::new());

    let shutdown_tx = Arc::clone(&shutdown);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
        shutdown_tx.notify_one();
    });

    PanelDaemon::new(config)
        .run(async move { shutdown.notified().await })
        .await
}

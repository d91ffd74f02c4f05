//! ==============================================================================
//! main.rs - weather station entry point
//! ==============================================================================
//!
//! responsibilities:
//!     - parse the command line and load station.toml
//!     - initialize tracing
//!     - wire the bus, sensor manager, display and status cache (station.rs)
//!     - run the optional periodic trigger
//!     - run the interactive console on stdin until quit / eof / ctrl-c
//!
//! architecture:
//!
//! ```text
//!     ┌──────────────────────────────────────────────────────────┐
//!     │                 weather station (this file)               │
//!     │  ┌─────────────┐   ┌──────────────┐                       │
//!     │  │ console     │   │ timer task   │  (tokio)              │
//!     │  │ (stdin)     │   │ (optional)   │                       │
//!     │  └──────┬──────┘   └──────┬───────┘                       │
//!     │         └──── spawn_blocking ────┐                        │
//!     │                           ┌──────┴──────┐                 │
//!     │                           │ message bus │ <- bus.rs       │
//!     │                           └─────────────┘                 │
//!     └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ==============================================================================

use weather_station::config::StationConfig;
use weather_station::console::{Outcome, HELP};
use weather_station::Station;

use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

/// Event-driven weather station console
#[derive(Parser, Debug)]
#[command(name = "weather-station")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to station.toml (defaults to config/station.toml)
    #[arg(short, long, env = "WS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // step 1: logging, with the filter replaceable once config is known
    let env_filter = EnvFilter::try_from_default_env().ok();
    let pinned = args.verbose || env_filter.is_some();
    let initial = if args.verbose {
        EnvFilter::new("debug")
    } else {
        env_filter.unwrap_or_else(|| EnvFilter::new("info"))
    };
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    // step 2: configuration
    let config = match &args.config {
        Some(path) => StationConfig::load(path)?,
        None => StationConfig::load_or_default(),
    };
    if !pinned {
        match config.logging.filter() {
            Ok(level) => filter_handle.modify(|f| *f = level)?,
            Err(e) => tracing::warn!(
                "[CONFIG] Invalid log level '{}': {} (keeping current filter)",
                config.logging.level,
                e
            ),
        }
    }
    config.log_summary();

    // step 3: wire the bus
    let station = match Station::build(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Fatal: station wiring failed: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Weather Station initialized. Type 'ws trigger' to request sensor reading.");

    // step 4: periodic trigger
    let timer = station.timer().map(|timer| tokio::spawn(timer.run()));

    // step 5: console
    println!("{HELP}");
    let console = Arc::new(station.console());
    let mut lines = spawn_stdin_reader();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        let console = console.clone();
        match tokio::task::spawn_blocking(move || console.run_line(&line)).await? {
            Ok(Outcome::Reply(text)) => println!("{text}"),
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Quit) => break,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    if let Some(task) = timer {
        task.abort();
    }
    tracing::info!(
        triggers = station.sensor_mgr.triggers_handled(),
        readings = station.display.rendered(),
        failed = station.sensor_mgr.failed_publishes(),
        "Weather Station stopped"
    );
    Ok(())
}

/// stdin lines from a dedicated thread, so a pending read never holds up shutdown
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn prompt() {
    print!("ws> ");
    if let Err(e) = std::io::stdout().flush() {
        tracing::debug!("stdout flush failed: {}", e);
    }
}

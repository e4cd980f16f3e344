//! # lantern-scanner
//!
//! Scans for iBeacons and prints every event as one JSON line on stdout.
//!
//! ## Running
//!
//! ```bash
//! # Replay captured advertisements (built without the `bluetooth` feature)
//! cargo run --package lantern-scanner < capture.txt
//!
//! # Scan with a BlueZ adapter
//! cargo run --package lantern-scanner --features bluetooth
//! ```
//!
//! Configuration is read from `LANTERN_CONFIG` when set, otherwise from the
//! platform config directory, with `LANTERN_*` environment overrides.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::path::PathBuf;

use anyhow::Context;
use lantern_core::{BeaconService, Config};
use lantern_scanner::logging;
use lantern_scanner::output::JsonLinesSink;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("LANTERN_ENV").is_ok_and(|env| env == "production");
    logging::init(is_production)?;

    let config_path = std::env::var_os("LANTERN_CONFIG").map(PathBuf::from);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("Starting lantern-scanner");

    #[cfg(feature = "bluetooth")]
    let radio = lantern_core::BluezRadio::acquire(config.bluetooth.adapter.as_deref())
        .await
        .context("Failed to acquire Bluetooth adapter")?;

    #[cfg(not(feature = "bluetooth"))]
    let radio = {
        info!("Built without Bluetooth support; replaying advertisements from stdin");
        lantern_scanner::replay::ReplayRadio::stdin()
    };

    let handle = BeaconService::start(config.scan, radio, JsonLinesSink::stdout())
        .context("Failed to start beacon service")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutting down");
    handle.stop().await?;

    Ok(())
}

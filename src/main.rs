//! UsbSleuth - removable storage watchdog.
//!
//! Thin binary entry point. All logic lives in the `usbsleuth-core`
//! and `usbsleuth-gui` crates.

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use anyhow::Context;
use usbsleuth_core::config::SentryConfig;

fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("UsbSleuth starting");

    let config = SentryConfig::load().context("failed to load configuration")?;
    tracing::info!(
        "Blacklist: {} | discovery {} ms | device poll {} ms | log {}",
        config.blacklist.join(", "),
        config.discovery_interval_ms,
        config.poll_interval_ms,
        config.log_path.display()
    );

    // Build application state before opening the window.
    let state = usbsleuth_gui::UsbSleuthState::build(config)?;

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_title("UsbSleuth -- Removable Device Monitor")
            .with_inner_size([1200.0, 760.0])
            .with_min_inner_size([800.0, 500.0])
            .with_transparent(true),
        ..Default::default()
    };

    eframe::run_native(
        "UsbSleuth",
        options,
        Box::new(|cc| {
            Ok(Box::new(usbsleuth_gui::UsbSleuthApp::with_state(
                cc, state,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("eframe error: {e}"))?;

    Ok(())
}

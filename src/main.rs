//! Collision Explorer - NYC Motor Vehicle Collisions Dashboard
//!
//! Loads the collision CSV export, cleans it, and shows filterable maps,
//! a per-minute histogram and a street ranking.

mod charts;
mod config;
mod data;
mod gui;
mod stats;

use anyhow::Context;
use clap::Parser;
use config::{Cli, DashboardConfig};
use eframe::egui;
use gui::CollisionExplorerApp;
use std::io;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let cli = Cli::parse();
    let config = DashboardConfig::resolve(&cli).context("invalid dashboard configuration")?;
    info!(
        data = %config.data_path.display(),
        rows = config.row_limit,
        "starting collision explorer"
    );

    // Configure native options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([1100.0, 700.0])
            .with_title("Collision Explorer"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Collision Explorer",
        options,
        Box::new(move |cc| Ok(Box::new(CollisionExplorerApp::new(cc, config)))),
    )
    .map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

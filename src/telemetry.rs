use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};

use crate::config::{Config, TelemetryConfig};

/// Initialize tracing output per the `[telemetry]` config section.
///
/// Disabled means human-readable stdout logging; enabled appends plain-text
/// records to the configured log file so long-running sessions survive a
/// terminal close.
///
/// # Errors
///
/// Returns an error when the log file or its parent directory cannot be
/// created. Must only be called once per process.
pub fn init(config: &TelemetryConfig) -> Result<()> {
    if !config.enabled {
        tracing_subscriber::fmt().with_target(false).init();
        return Ok(());
    }

    let log_path = Config::expand_path(&config.log_path)?;

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("failed to create log directory")?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_target(false)
        .with_ansi(false)
        .init();

    tracing::info!("logging to {}", log_path.display());

    Ok(())
}

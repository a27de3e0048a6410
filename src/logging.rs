use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use termdbg_config::LogLevel;
use termdbg_platform::logging::ensure_log_dir;
use termdbg_platform::{prepare_log_file, LogFileSettings, PlatformPaths};
use tracing_subscriber::EnvFilter;

/// Send tracing output to the log file so it never reaches the terminal.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(paths: &dyn PlatformPaths, level: LogLevel, file: Option<PathBuf>) -> Result<PathBuf> {
    let path = match file {
        Some(path) => {
            ensure_log_dir(&path)
                .with_context(|| format!("failed to create log directory for {}", path.display()))?;
            path
        }
        None => prepare_log_file(paths, LogFileSettings::default())
            .context("failed to prepare the log file")?,
    };
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install the log subscriber: {e}"))?;
    Ok(path)
}

//! Log-file housekeeping.
//!
//! The `tracing-subscriber` setup lives in the binary; this module only
//! decides where the log file goes and keeps it from growing unbounded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::paths::PlatformPaths;

/// Name of the active log file inside the log directory.
pub const LOG_FILE_NAME: &str = "termdbg.log";

/// Maximum size of a single log file before rotation (10 MB).
pub const DEFAULT_MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Maximum number of rotated log files to retain.
pub const DEFAULT_MAX_LOG_FILES: u32 = 5;

/// Rotation limits applied by [`prepare_log_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileSettings {
    pub max_size: u64,
    pub max_files: u32,
}

impl Default for LogFileSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_LOG_SIZE,
            max_files: DEFAULT_MAX_LOG_FILES,
        }
    }
}

/// Resolve the log file path, create its directory, and rotate the
/// previous file if it grew past the limit.
///
/// Returns the path the subscriber should append to.
pub fn prepare_log_file(
    paths: &dyn PlatformPaths,
    settings: LogFileSettings,
) -> io::Result<PathBuf> {
    let path = paths.log_dir().join(LOG_FILE_NAME);
    ensure_log_dir(&path)?;
    rotate_log_files(&path, settings.max_size, settings.max_files)?;
    Ok(path)
}

/// Ensure the parent directory of a log file exists.
pub fn ensure_log_dir(log_path: &Path) -> io::Result<()> {
    match log_path.parent() {
        Some(parent) if !parent.exists() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Rotate log files when the current file exceeds `max_size` bytes.
///
/// ```text
///   termdbg.log   → termdbg.log.1
///   termdbg.log.1 → termdbg.log.2
///   …
///   termdbg.log.<max_files> is deleted
/// ```
pub fn rotate_log_files(log_path: &Path, max_size: u64, max_files: u32) -> io::Result<()> {
    if !log_path.exists() || fs::metadata(log_path)?.len() < max_size {
        return Ok(());
    }

    let oldest = rotated_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for i in (1..max_files).rev() {
        let from = rotated_path(log_path, i);
        if from.exists() {
            fs::rename(&from, rotated_path(log_path, i + 1))?;
        }
    }

    fs::rename(log_path, rotated_path(log_path, 1))
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let name = base.file_name().unwrap_or_default().to_string_lossy();
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}.{index}"))
}

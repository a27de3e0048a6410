use std::path::{Path, PathBuf};

use crate::error::PlatformError;

/// Standard directory locations used by termdbg.
pub trait PlatformPaths: Send + Sync {
    /// Returns the configuration directory (`~/.config/termdbg`).
    fn config_dir(&self) -> PathBuf;
    /// Returns the data directory (`~/.local/share/termdbg`).
    fn data_dir(&self) -> PathBuf;
    /// Returns the log directory (`<data_dir>/logs`).
    fn log_dir(&self) -> PathBuf;
}

/// Default implementation of [`PlatformPaths`] rooted at the user's home
/// directory.
#[derive(Debug, Clone)]
pub struct DefaultPaths {
    home: PathBuf,
}

impl DefaultPaths {
    /// Resolve the home directory via `dirs`, falling back to `$HOME`.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Path` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, PlatformError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .ok_or_else(|| PlatformError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Root all locations under an explicit directory instead of `$HOME`.
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        Self {
            home: home.as_ref().to_path_buf(),
        }
    }
}

impl PlatformPaths for DefaultPaths {
    fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join("termdbg")
    }

    fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join("termdbg")
    }

    fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

use thiserror::Error;

/// Errors that can occur while resolving platform locations.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("path error: {0}")]
    Path(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

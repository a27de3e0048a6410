use thiserror::Error;

/// Errors raised by console implementations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A single-consumer stream was requested twice.
    #[error("{0} stream already observed")]
    AlreadyObserved(&'static str),

    #[error("console is closed")]
    Closed,

    /// Interrupt listening needs a running tokio runtime.
    #[error("no async runtime available for {0}")]
    NoRuntime(&'static str),
}

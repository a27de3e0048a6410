//! DAP error types.

use thiserror::Error;

/// Errors from adapter communication.
#[derive(Debug, Error)]
pub enum DapError {
    /// Adapter process failed to start.
    #[error("adapter '{program}' failed to start: {source}")]
    AdapterSpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport-level communication error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request timed out waiting for a response.
    #[error("request timed out: {command}")]
    Timeout { command: String },

    /// Adapter answered with `success: false`.
    #[error("{command} failed: {message}")]
    Rejected { command: String, message: String },

    /// Adapter sent an invalid or unparseable message.
    #[error("adapter sent invalid response: {0}")]
    InvalidResponse(String),

    /// The adapter connection is gone.
    #[error("adapter disconnected")]
    Disconnected,
}

impl From<std::io::Error> for DapError {
    fn from(e: std::io::Error) -> Self {
        DapError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_adapter_spawn_failed_display() {
        let err = DapError::AdapterSpawnFailed {
            program: "lldb-dap".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "binary missing"),
        };
        assert_eq!(
            err.to_string(),
            "adapter 'lldb-dap' failed to start: binary missing"
        );
    }

    #[test]
    fn error_timeout_display() {
        let err = DapError::Timeout {
            command: "evaluate".into(),
        };
        assert_eq!(err.to_string(), "request timed out: evaluate");
    }

    #[test]
    fn error_rejected_display() {
        let err = DapError::Rejected {
            command: "next".into(),
            message: "thread is running".into(),
        };
        assert_eq!(err.to_string(), "next failed: thread is running");
    }

    #[test]
    fn error_from_io_is_transport() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broken");
        let err: DapError = io_err.into();
        assert!(matches!(err, DapError::Transport(ref m) if m == "pipe broken"));
    }

    #[test]
    fn error_disconnected_display() {
        assert_eq!(DapError::Disconnected.to_string(), "adapter disconnected");
    }
}

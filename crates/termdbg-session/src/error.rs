use termdbg_console::ConsoleError;
use termdbg_dap::DapError;
use thiserror::Error;

use crate::state::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active debug session")]
    NoActiveSession,

    #[error("the debuggee is running; use 'pause' first")]
    NotStopped,

    #[error("the debuggee is not running")]
    NotRunning,

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("no breakpoint number {0}")]
    UnknownBreakpoint(u32),

    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    #[error(transparent)]
    Adapter(#[from] DapError),

    #[error(transparent)]
    Console(#[from] ConsoleError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Adapter(DapError::InvalidResponse(err.to_string()))
    }
}

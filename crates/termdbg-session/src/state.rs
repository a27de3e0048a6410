//! Session state machine.

use std::fmt;

use crate::error::SessionError;

/// Lifecycle of a debug session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No adapter has been launched.
    Uninitialized,
    /// The adapter is starting and the debuggee is being launched or attached.
    Launching,
    Running,
    /// The debuggee is paused, or a pause has been requested.
    Interrupted,
    Terminating,
    Terminated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Launching => "launching",
            SessionState::Running => "running",
            SessionState::Interrupted => "interrupted",
            SessionState::Terminating => "terminating",
            SessionState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Guards the transitions between [`SessionState`]s.
///
/// Every transition moves forward except `Running ⇄ Interrupted`.
#[derive(Debug)]
pub struct SessionMachine {
    state: SessionState,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Uninitialized → Launching.
    pub fn begin_launch(&mut self) -> Result<(), SessionError> {
        self.expect("launch", &[SessionState::Uninitialized])?;
        self.state = SessionState::Launching;
        Ok(())
    }

    /// Launching → Running.
    pub fn launched(&mut self) -> Result<(), SessionError> {
        self.expect("finish launching", &[SessionState::Launching])?;
        self.state = SessionState::Running;
        Ok(())
    }

    /// Launching → Terminated.
    pub fn launch_failed(&mut self) -> Result<(), SessionError> {
        self.expect("fail a launch", &[SessionState::Launching])?;
        self.state = SessionState::Terminated;
        Ok(())
    }

    /// Running → Interrupted. Already being interrupted is fine.
    pub fn interrupt(&mut self) -> Result<(), SessionError> {
        self.expect(
            "interrupt",
            &[SessionState::Running, SessionState::Interrupted],
        )?;
        self.state = SessionState::Interrupted;
        Ok(())
    }

    /// Interrupted → Running. Already running is fine.
    pub fn resume(&mut self) -> Result<(), SessionError> {
        self.expect("resume", &[SessionState::Interrupted, SessionState::Running])?;
        self.state = SessionState::Running;
        Ok(())
    }

    /// Any live state → Terminating.
    pub fn begin_close(&mut self) -> Result<(), SessionError> {
        self.expect(
            "close",
            &[
                SessionState::Uninitialized,
                SessionState::Launching,
                SessionState::Running,
                SessionState::Interrupted,
            ],
        )?;
        self.state = SessionState::Terminating;
        Ok(())
    }

    /// Terminating → Terminated; a terminated session stays terminated.
    pub fn finish_close(&mut self) -> Result<(), SessionError> {
        self.expect(
            "finish closing",
            &[SessionState::Terminating, SessionState::Terminated],
        )?;
        self.state = SessionState::Terminated;
        Ok(())
    }

    fn expect(&self, action: &'static str, allowed: &[SessionState]) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            })
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

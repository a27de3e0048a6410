//! termdbg-session: the debug session controller.
//!
//! [`Debugger`] drives one adapter through the session state machine, runs
//! the read-dispatch loop over a [`termdbg_console::ConsoleIo`] and provides
//! the built-in REPL commands.

pub mod commands;
pub mod debugger;
pub mod error;
pub mod fake;
pub mod state;

pub use debugger::{Debugger, DebuggerSettings};
pub use error::SessionError;
pub use fake::{launch_descriptor, FakeChannel, FakeConnector};
pub use state::{SessionMachine, SessionState};

//! termdbg-console: terminal I/O for the debugger REPL.
//!
//! A [`ConsoleIo`] owns the terminal mode and exposes two independent
//! input sequences: submitted lines and interrupt requests (Ctrl-C).

pub mod console;
pub mod control;
pub mod error;
pub mod event;
pub mod guard;
pub mod line_editor;
pub mod mock;
pub mod terminal;

pub use console::ConsoleIo;
pub use control::{CrosstermControl, MockControl, TerminalControl, TerminalOp};
pub use error::ConsoleError;
pub use event::{InputEvent, InterruptStream, LineStream};
pub use guard::FullScreenGuard;
pub use line_editor::{EditAction, LineEditor};
pub use mock::ScriptedConsole;
pub use terminal::TerminalConsole;

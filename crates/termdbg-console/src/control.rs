use std::io::Write;
use std::sync::{Arc, Mutex};

use crossterm::cursor::MoveToColumn;
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};

use crate::error::ConsoleError;

/// Low-level terminal operations (real or mock).
pub trait TerminalControl: Send {
    fn enable_raw_mode(&mut self) -> Result<(), ConsoleError>;
    fn disable_raw_mode(&mut self) -> Result<(), ConsoleError>;
    fn enter_alternate_screen(&mut self) -> Result<(), ConsoleError>;
    fn leave_alternate_screen(&mut self) -> Result<(), ConsoleError>;
    /// Write `text` followed by a line terminator; raw mode needs `\r\n`.
    fn write_line(&mut self, text: &str, raw: bool) -> Result<(), ConsoleError>;
    /// Erase the current row and draw `prompt` followed by `input`.
    fn redraw_input(&mut self, prompt: &str, input: &str) -> Result<(), ConsoleError>;
    /// Erase the current row, leaving the cursor in column 0.
    fn clear_input(&mut self) -> Result<(), ConsoleError>;
}

/// crossterm-backed control of the process' stdout.
pub struct CrosstermControl {
    stdout: std::io::Stdout,
}

impl CrosstermControl {
    pub fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
        }
    }
}

impl Default for CrosstermControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalControl for CrosstermControl {
    fn enable_raw_mode(&mut self) -> Result<(), ConsoleError> {
        terminal::enable_raw_mode().map_err(ConsoleError::Io)
    }

    fn disable_raw_mode(&mut self) -> Result<(), ConsoleError> {
        terminal::disable_raw_mode().map_err(ConsoleError::Io)
    }

    fn enter_alternate_screen(&mut self) -> Result<(), ConsoleError> {
        crossterm::execute!(self.stdout, EnterAlternateScreen).map_err(ConsoleError::Io)
    }

    fn leave_alternate_screen(&mut self) -> Result<(), ConsoleError> {
        crossterm::execute!(self.stdout, LeaveAlternateScreen).map_err(ConsoleError::Io)
    }

    fn write_line(&mut self, text: &str, raw: bool) -> Result<(), ConsoleError> {
        let ending = if raw { "\r\n" } else { "\n" };
        crossterm::execute!(self.stdout, Print(text), Print(ending)).map_err(ConsoleError::Io)
    }

    fn redraw_input(&mut self, prompt: &str, input: &str) -> Result<(), ConsoleError> {
        crossterm::execute!(
            self.stdout,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(prompt),
            Print(input)
        )
        .map_err(ConsoleError::Io)?;
        self.stdout.flush().map_err(ConsoleError::Io)
    }

    fn clear_input(&mut self) -> Result<(), ConsoleError> {
        crossterm::execute!(self.stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))
            .map_err(ConsoleError::Io)
    }
}

/// One recorded [`MockControl`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOp {
    EnableRawMode,
    DisableRawMode,
    EnterAlternateScreen,
    LeaveAlternateScreen,
    Line { text: String, raw: bool },
    RedrawInput(String),
    ClearInput,
}

/// Mock control for testing; records every operation into a shared log.
#[derive(Debug, Clone, Default)]
pub struct MockControl {
    ops: Arc<Mutex<Vec<TerminalOp>>>,
}

impl MockControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the operations recorded so far.
    pub fn ops(&self) -> Vec<TerminalOp> {
        self.ops.lock().map(|ops| ops.clone()).unwrap_or_default()
    }

    /// Count of recorded operations equal to `op`.
    pub fn count(&self, op: &TerminalOp) -> usize {
        self.ops().iter().filter(|o| *o == op).count()
    }

    fn record(&self, op: TerminalOp) -> Result<(), ConsoleError> {
        if let Ok(mut ops) = self.ops.lock() {
            ops.push(op);
        }
        Ok(())
    }
}

impl TerminalControl for MockControl {
    fn enable_raw_mode(&mut self) -> Result<(), ConsoleError> {
        self.record(TerminalOp::EnableRawMode)
    }

    fn disable_raw_mode(&mut self) -> Result<(), ConsoleError> {
        self.record(TerminalOp::DisableRawMode)
    }

    fn enter_alternate_screen(&mut self) -> Result<(), ConsoleError> {
        self.record(TerminalOp::EnterAlternateScreen)
    }

    fn leave_alternate_screen(&mut self) -> Result<(), ConsoleError> {
        self.record(TerminalOp::LeaveAlternateScreen)
    }

    fn write_line(&mut self, text: &str, raw: bool) -> Result<(), ConsoleError> {
        self.record(TerminalOp::Line {
            text: text.to_string(),
            raw,
        })
    }

    fn redraw_input(&mut self, prompt: &str, input: &str) -> Result<(), ConsoleError> {
        self.record(TerminalOp::RedrawInput(format!("{prompt}{input}")))
    }

    fn clear_input(&mut self) -> Result<(), ConsoleError> {
        self.record(TerminalOp::ClearInput)
    }
}

use crate::error::ConsoleError;
use crate::event::{InterruptStream, LineStream};

/// Terminal I/O contract used by the debugger session and its commands.
///
/// Every method takes `&self`; implementations are shared between the
/// dispatch loop, the interrupt listener, and adapter event pumps.
pub trait ConsoleIo: Send + Sync {
    /// Take exclusive control of the terminal (raw input, alternate screen).
    fn enter_full_screen(&self) -> Result<(), ConsoleError>;

    /// Restore the terminal mode saved by [`enter_full_screen`]. Safe to call
    /// repeatedly and without a matching enter.
    ///
    /// [`enter_full_screen`]: ConsoleIo::enter_full_screen
    fn exit_full_screen(&self) -> Result<(), ConsoleError>;

    /// Write one line of output.
    fn output_line(&self, text: &str);

    /// Write an empty line.
    fn blank_line(&self) {
        self.output_line("");
    }

    /// Take the line-input sequence. Fails on a second call.
    fn observe_lines(&self) -> Result<LineStream, ConsoleError>;

    /// Take the interrupt sequence. Fails on a second call.
    fn observe_interrupts(&self) -> Result<InterruptStream, ConsoleError>;

    /// Release all terminal resources and end both sequences. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

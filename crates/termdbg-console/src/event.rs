//! Input events and the two single-consumer streams that carry them.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::error::ConsoleError;

/// One item on either input sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A submitted line, without its terminator.
    Line(String),
    /// The user asked to break into the debuggee.
    Interrupt,
    /// End of line input. Never followed by another line.
    End,
}

/// The line-input sequence.
///
/// Once [`InputEvent::End`] has been yielded every further call to
/// [`next`](LineStream::next) yields `End` again without waiting.
#[derive(Debug)]
pub struct LineStream {
    rx: mpsc::UnboundedReceiver<InputEvent>,
    ended: bool,
}

impl LineStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<InputEvent>) -> Self {
        Self { rx, ended: false }
    }

    /// Wait for the next line, or `End`.
    pub async fn next(&mut self) -> InputEvent {
        if self.ended {
            return InputEvent::End;
        }
        loop {
            match self.rx.recv().await {
                Some(InputEvent::Line(text)) => return InputEvent::Line(text),
                // Interrupts travel on their own stream.
                Some(InputEvent::Interrupt) => continue,
                Some(InputEvent::End) | None => {
                    self.ended = true;
                    self.rx.close();
                    return InputEvent::End;
                }
            }
        }
    }

    /// Whether `End` has already been observed.
    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

/// The interrupt sequence. Yields [`InputEvent::Interrupt`] per request and
/// `None` once the console has been closed.
#[derive(Debug)]
pub struct InterruptStream {
    rx: mpsc::UnboundedReceiver<()>,
}

impl InterruptStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<()>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<InputEvent> {
        self.rx.recv().await.map(|()| InputEvent::Interrupt)
    }
}

/// Producer halves handed to listener threads and tasks.
#[derive(Debug, Clone)]
pub(crate) struct InputSenders {
    pub(crate) lines: mpsc::UnboundedSender<InputEvent>,
    pub(crate) interrupts: mpsc::UnboundedSender<()>,
}

/// Holds each stream until its single consumer takes it.
#[derive(Debug)]
pub(crate) struct StreamSlots {
    lines: Mutex<Option<LineStream>>,
    interrupts: Mutex<Option<InterruptStream>>,
}

impl StreamSlots {
    pub(crate) fn take_lines(&self) -> Result<LineStream, ConsoleError> {
        self.lines
            .lock()
            .map_err(|_| ConsoleError::Closed)?
            .take()
            .ok_or(ConsoleError::AlreadyObserved("line"))
    }

    pub(crate) fn take_interrupts(&self) -> Result<InterruptStream, ConsoleError> {
        self.interrupts
            .lock()
            .map_err(|_| ConsoleError::Closed)?
            .take()
            .ok_or(ConsoleError::AlreadyObserved("interrupt"))
    }
}

/// Create a connected sender/stream set.
pub(crate) fn input_channels() -> (InputSenders, StreamSlots) {
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let (int_tx, int_rx) = mpsc::unbounded_channel();
    let senders = InputSenders {
        lines: line_tx,
        interrupts: int_tx,
    };
    let slots = StreamSlots {
        lines: Mutex::new(Some(LineStream::new(line_rx))),
        interrupts: Mutex::new(Some(InterruptStream::new(int_rx))),
    };
    (senders, slots)
}

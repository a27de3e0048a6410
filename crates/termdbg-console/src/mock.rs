use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use crate::console::ConsoleIo;
use crate::error::ConsoleError;
use crate::event::{input_channels, InputEvent, InputSenders, InterruptStream, LineStream, StreamSlots};

/// Scripted console for tests: input is pushed by the test, output is
/// captured in memory.
pub struct ScriptedConsole {
    output: Mutex<Vec<String>>,
    senders: Mutex<Option<InputSenders>>,
    slots: StreamSlots,
    full_screen: AtomicBool,
    closed: AtomicBool,
    enter_count: AtomicUsize,
    release_count: AtomicUsize,
    close_count: AtomicUsize,
}

impl ScriptedConsole {
    pub fn new() -> Self {
        let (senders, slots) = input_channels();
        Self {
            output: Mutex::new(Vec::new()),
            senders: Mutex::new(Some(senders)),
            slots,
            full_screen: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            enter_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
            close_count: AtomicUsize::new(0),
        }
    }

    /// Build a console whose line input is `lines` followed by end of input.
    pub fn with_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let console = Self::new();
        for line in lines {
            console.push_line(line);
        }
        console.end_input();
        console
    }

    fn send(&self, f: impl FnOnce(&InputSenders)) {
        if let Some(senders) = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            f(senders);
        }
    }

    pub fn push_line(&self, line: impl Into<String>) {
        let line = line.into();
        self.send(|s| {
            let _ = s.lines.send(InputEvent::Line(line));
        });
    }

    pub fn interrupt(&self) {
        self.send(|s| {
            let _ = s.interrupts.send(());
        });
    }

    pub fn end_input(&self) {
        self.send(|s| {
            let _ = s.lines.send(InputEvent::End);
        });
    }

    /// Every line written so far.
    pub fn output(&self) -> Vec<String> {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any output line contains `needle`.
    pub fn output_contains(&self, needle: &str) -> bool {
        self.output().iter().any(|l| l.contains(needle))
    }

    pub fn is_full_screen(&self) -> bool {
        self.full_screen.load(Ordering::SeqCst)
    }

    pub fn enter_count(&self) -> usize {
        self.enter_count.load(Ordering::SeqCst)
    }

    /// Number of times full screen was actually released.
    pub fn release_count(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    /// Number of times `close` was called, including no-op repeats.
    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleIo for ScriptedConsole {
    fn enter_full_screen(&self) -> Result<(), ConsoleError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConsoleError::Closed);
        }
        if !self.full_screen.swap(true, Ordering::SeqCst) {
            self.enter_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn exit_full_screen(&self) -> Result<(), ConsoleError> {
        if self.full_screen.swap(false, Ordering::SeqCst) {
            self.release_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn output_line(&self, text: &str) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }

    fn observe_lines(&self) -> Result<LineStream, ConsoleError> {
        self.slots.take_lines()
    }

    fn observe_interrupts(&self) -> Result<InterruptStream, ConsoleError> {
        self.slots.take_interrupts()
    }

    fn close(&self) {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.exit_full_screen();
        if let Some(senders) = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = senders.lines.send(InputEvent::End);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

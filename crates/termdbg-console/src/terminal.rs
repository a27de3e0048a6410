use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossterm::event::{self, Event};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::console::ConsoleIo;
use crate::control::{CrosstermControl, TerminalControl};
use crate::error::ConsoleError;
use crate::event::{input_channels, InputEvent, InputSenders, InterruptStream, LineStream, StreamSlots};
use crate::line_editor::{EditAction, LineEditor};

pub const PROMPT: &str = "(termdbg) ";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// State shared with the listener thread.
struct Shared {
    control: Mutex<Box<dyn TerminalControl>>,
    editor: Mutex<LineEditor>,
    full_screen: AtomicBool,
    stop: AtomicBool,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Box<dyn TerminalControl>> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn editor(&self) -> MutexGuard<'_, LineEditor> {
        self.editor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn redraw_prompt(&self) {
        let buffer = self.editor().buffer().to_string();
        if let Err(e) = self.control().redraw_input(PROMPT, &buffer) {
            warn!(error = %e, "failed to redraw prompt");
        }
    }

    fn write_line(&self, text: &str) {
        let raw = self.full_screen.load(Ordering::SeqCst);
        let buffer = raw.then(|| self.editor().buffer().to_string());
        let mut control = self.control();
        let result = match buffer {
            Some(buffer) => control
                .clear_input()
                .and_then(|()| control.write_line(text, true))
                .and_then(|()| control.redraw_input(PROMPT, &buffer)),
            None => control.write_line(text, false),
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write console output");
        }
    }
}

/// Console bound to the process terminal.
///
/// In full-screen mode keys are read through crossterm on a dedicated thread
/// and edited in place behind a prompt. With `plain` set, lines come from
/// standard input and interrupts from SIGINT; full-screen calls are no-ops.
pub struct TerminalConsole {
    shared: Arc<Shared>,
    plain: bool,
    senders: Mutex<Option<InputSenders>>,
    slots: StreamSlots,
    listening: AtomicBool,
    closed: AtomicBool,
    signal_task: Mutex<Option<JoinHandle<()>>>,
}

impl TerminalConsole {
    pub fn new(plain: bool) -> Self {
        Self::with_control(Box::new(CrosstermControl::new()), plain)
    }

    pub fn with_control(control: Box<dyn TerminalControl>, plain: bool) -> Self {
        let (senders, slots) = input_channels();
        Self {
            shared: Arc::new(Shared {
                control: Mutex::new(control),
                editor: Mutex::new(LineEditor::new()),
                full_screen: AtomicBool::new(false),
                stop: AtomicBool::new(false),
            }),
            plain,
            senders: Mutex::new(Some(senders)),
            slots,
            listening: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            signal_task: Mutex::new(None),
        }
    }

    pub fn is_plain(&self) -> bool {
        self.plain
    }

    /// Start the input listeners once, on first observation.
    fn ensure_listening(&self) -> Result<(), ConsoleError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let senders = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        // Already closed: the streams end on their own.
        let Some(senders) = senders else {
            return Ok(());
        };

        if self.plain {
            let handle = tokio::runtime::Handle::try_current()
                .map_err(|_| ConsoleError::NoRuntime("interrupt listener"))?;
            spawn_stdin_reader(senders.lines.clone(), Arc::clone(&self.shared))?;
            let task = handle.spawn(sigint_listener(senders.interrupts));
            *self
                .signal_task
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(task);
        } else {
            spawn_key_reader(senders, Arc::clone(&self.shared))?;
        }
        Ok(())
    }
}

impl ConsoleIo for TerminalConsole {
    fn enter_full_screen(&self) -> Result<(), ConsoleError> {
        if self.plain {
            return Ok(());
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(ConsoleError::Closed);
        }
        if self.shared.full_screen.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = {
            let mut control = self.shared.control();
            control
                .enable_raw_mode()
                .and_then(|()| control.enter_alternate_screen())
        };
        if let Err(e) = result {
            self.shared.full_screen.store(false, Ordering::SeqCst);
            let _ = self.shared.control().disable_raw_mode();
            return Err(e);
        }
        debug!("entered full screen");
        self.shared.redraw_prompt();
        Ok(())
    }

    fn exit_full_screen(&self) -> Result<(), ConsoleError> {
        if !self.shared.full_screen.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut control = self.shared.control();
        // Both steps run even if the first one fails.
        let left = control.leave_alternate_screen();
        let raw = control.disable_raw_mode();
        debug!("left full screen");
        left.and(raw)
    }

    fn output_line(&self, text: &str) {
        self.shared.write_line(text);
    }

    fn observe_lines(&self) -> Result<LineStream, ConsoleError> {
        let stream = self.slots.take_lines()?;
        self.ensure_listening()?;
        Ok(stream)
    }

    fn observe_interrupts(&self) -> Result<InterruptStream, ConsoleError> {
        let stream = self.slots.take_interrupts()?;
        self.ensure_listening()?;
        Ok(stream)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.exit_full_screen() {
            warn!(error = %e, "failed to restore terminal");
        }
        self.shared.stop.store(true, Ordering::SeqCst);
        if let Some(senders) = self
            .senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = senders.lines.send(InputEvent::End);
        }
        if let Some(task) = self
            .signal_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        debug!("console closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for TerminalConsole {
    fn drop(&mut self) {
        self.close();
    }
}

fn spawn_key_reader(senders: InputSenders, shared: Arc<Shared>) -> Result<(), ConsoleError> {
    std::thread::Builder::new()
        .name("termdbg-keys".into())
        .spawn(move || key_reader_loop(&senders, &shared))?;
    Ok(())
}

fn key_reader_loop(senders: &InputSenders, shared: &Shared) {
    while !shared.stop.load(Ordering::SeqCst) {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                warn!(error = %e, "terminal poll failed");
                break;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "terminal read failed");
                break;
            }
        };
        let action = shared.editor().handle_key(key);
        match action {
            EditAction::Submit(line) => {
                {
                    let mut control = shared.control();
                    let _ = control.redraw_input(PROMPT, &line);
                    let _ = control.write_line("", true);
                }
                shared.redraw_prompt();
                if senders.lines.send(InputEvent::Line(line)).is_err() {
                    return;
                }
            }
            EditAction::Interrupt => {
                shared.redraw_prompt();
                let _ = senders.interrupts.send(());
            }
            EditAction::EndOfInput => break,
            EditAction::Changed => shared.redraw_prompt(),
            EditAction::Ignored => {}
        }
    }
    let _ = senders.lines.send(InputEvent::End);
    debug!("key reader stopped");
}

fn spawn_stdin_reader(
    lines: tokio::sync::mpsc::UnboundedSender<InputEvent>,
    shared: Arc<Shared>,
) -> Result<(), ConsoleError> {
    std::thread::Builder::new()
        .name("termdbg-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                if shared.stop.load(Ordering::SeqCst) {
                    return;
                }
                match line {
                    Ok(line) => {
                        if lines.send(InputEvent::Line(line)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
            let _ = lines.send(InputEvent::End);
            debug!("stdin reached end of input");
        })?;
    Ok(())
}

async fn sigint_listener(interrupts: tokio::sync::mpsc::UnboundedSender<()>) {
    loop {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for SIGINT");
            return;
        }
        if interrupts.send(()).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{MockControl, TerminalOp};

    fn console(plain: bool) -> (TerminalConsole, MockControl) {
        let mock = MockControl::new();
        let console = TerminalConsole::with_control(Box::new(mock.clone()), plain);
        (console, mock)
    }

    #[test]
    fn full_screen_is_acquired_and_released_once() {
        let (console, mock) = console(false);
        console.enter_full_screen().unwrap();
        console.enter_full_screen().unwrap();
        console.exit_full_screen().unwrap();
        console.exit_full_screen().unwrap();
        console.close();

        assert_eq!(mock.count(&TerminalOp::EnableRawMode), 1);
        assert_eq!(mock.count(&TerminalOp::EnterAlternateScreen), 1);
        assert_eq!(mock.count(&TerminalOp::LeaveAlternateScreen), 1);
        assert_eq!(mock.count(&TerminalOp::DisableRawMode), 1);
    }

    #[test]
    fn close_releases_full_screen() {
        let (console, mock) = console(false);
        console.enter_full_screen().unwrap();
        console.close();
        console.close();
        drop(console);

        assert!(mock.ops().ends_with(&[
            TerminalOp::LeaveAlternateScreen,
            TerminalOp::DisableRawMode
        ]));
        assert_eq!(mock.count(&TerminalOp::DisableRawMode), 1);
    }

    #[test]
    fn exit_without_enter_is_noop() {
        let (console, mock) = console(false);
        console.exit_full_screen().unwrap();
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn enter_after_close_fails() {
        let (console, _mock) = console(false);
        console.close();
        assert!(matches!(
            console.enter_full_screen(),
            Err(ConsoleError::Closed)
        ));
    }

    #[test]
    fn plain_mode_never_touches_terminal_mode() {
        let (console, mock) = console(true);
        console.enter_full_screen().unwrap();
        console.output_line("hello");
        console.close();

        assert_eq!(
            mock.ops(),
            vec![TerminalOp::Line {
                text: "hello".into(),
                raw: false
            }]
        );
    }

    #[test]
    fn full_screen_output_redraws_prompt() {
        let (console, mock) = console(false);
        console.enter_full_screen().unwrap();
        console.output_line("stopped at main.py:3");

        let ops = mock.ops();
        let tail = &ops[ops.len() - 3..];
        assert_eq!(
            tail,
            &[
                TerminalOp::ClearInput,
                TerminalOp::Line {
                    text: "stopped at main.py:3".into(),
                    raw: true
                },
                TerminalOp::RedrawInput(PROMPT.into()),
            ]
        );
    }

    #[tokio::test]
    async fn close_ends_line_stream() {
        let (console, _mock) = console(false);
        // Taken from the slot directly so no real listener thread starts.
        let mut lines = console.slots.take_lines().unwrap();
        console.close();
        assert_eq!(lines.next().await, InputEvent::End);
        assert!(console.is_closed());
    }
}

//! The session controller.
//!
//! A [`Debugger`] owns the console handle, the adapter channel and the
//! breakpoint list. Commands, the interrupt listener and the adapter event
//! pump all hold clones of it; all state changes go through its methods.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use termdbg_adapter::{AdapterConnector, AdapterDescriptor, DebuggeeTarget};
use termdbg_command::CommandDispatcher;
use termdbg_console::{ConsoleIo, InputEvent};
use termdbg_dap::{
    BreakpointEventBody, BreakpointManager, ContinuedEventBody, DebugChannel, Event,
    ExitedEventBody, OutputEventBody, SetBreakpointsResponseBody, StoppedEventBody,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::SessionError;
use crate::state::{SessionMachine, SessionState};

/// Tunables for a [`Debugger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebuggerSettings {
    /// Upper bound on adapter teardown in `close_session`.
    pub close_timeout: Duration,
}

impl Default for DebuggerSettings {
    fn default() -> Self {
        Self {
            close_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Default)]
struct SessionData {
    machine: SessionMachine,
    channel: Option<Arc<dyn DebugChannel>>,
    descriptor: Option<Arc<AdapterDescriptor>>,
    /// Thread of the most recent `stopped` event.
    stopped_thread: Option<i64>,
    last_error: Option<String>,
}

struct Inner {
    console: Arc<dyn ConsoleIo>,
    connector: Arc<dyn AdapterConnector>,
    settings: DebuggerSettings,
    data: Mutex<SessionData>,
    breakpoints: Mutex<BreakpointManager>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    /// Held for the whole of `close_session`; `true` once it has completed.
    closed: tokio::sync::Mutex<bool>,
}

/// Handle to the session controller. Clones share one session.
#[derive(Clone)]
pub struct Debugger {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Debugger {
    pub fn new(
        console: Arc<dyn ConsoleIo>,
        connector: Arc<dyn AdapterConnector>,
        settings: DebuggerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                console,
                connector,
                settings,
                data: Mutex::new(SessionData::default()),
                breakpoints: Mutex::new(BreakpointManager::new()),
                event_task: Mutex::new(None),
                closed: tokio::sync::Mutex::new(false),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        lock(&self.inner.data).machine.state()
    }

    /// Why the last launch failed, if it did.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.inner.data).last_error.clone()
    }

    pub fn console(&self) -> &Arc<dyn ConsoleIo> {
        &self.inner.console
    }

    pub fn descriptor(&self) -> Option<Arc<AdapterDescriptor>> {
        lock(&self.inner.data).descriptor.clone()
    }

    pub(crate) fn output(&self, text: &str) {
        self.inner.console.output_line(text);
    }

    /// Start the adapter for `descriptor` and return the resulting state.
    ///
    /// Failures are written to the console and kept in
    /// [`last_error`](Self::last_error); they never propagate.
    pub async fn launch(&self, descriptor: AdapterDescriptor) -> SessionState {
        let begun = lock(&self.inner.data).machine.begin_launch();
        if let Err(err) = begun {
            self.output(&err.to_string());
            return self.state();
        }
        let descriptor = Arc::new(descriptor);
        info!(adapter = %descriptor.adapter_type, target = %descriptor.describe(), "launching");

        let channel = match self.inner.connector.connect(&descriptor).await {
            Ok(channel) => channel,
            Err(err) => {
                let message = format!(
                    "could not start the {} adapter: {err}",
                    descriptor.adapter_type
                );
                error!(adapter = %descriptor.adapter_type, error = %err, "launch failed");
                self.output(&message);
                let mut data = lock(&self.inner.data);
                if data.machine.launch_failed().is_err() {
                    debug!(state = %data.machine.state(), "launch failure after close");
                }
                data.last_error = Some(message);
                return data.machine.state();
            }
        };

        let events = channel.take_events();
        let adopted = {
            let mut data = lock(&self.inner.data);
            match data.machine.launched() {
                Ok(()) => {
                    data.channel = Some(channel.clone());
                    data.descriptor = Some(descriptor.clone());
                    true
                }
                Err(_) => false,
            }
        };
        if !adopted {
            warn!("session closed while the adapter was starting");
            if let Err(err) = channel.disconnect(true).await {
                debug!(error = %err, "disconnect of late adapter failed");
            }
            return self.state();
        }

        if let Some(events) = events {
            let pump = tokio::spawn(self.clone().pump_events(events));
            *lock(&self.inner.event_task) = Some(pump);
        }
        self.sync_all_breakpoints().await;
        self.output(&format!(
            "{} session started: {}",
            descriptor.adapter_type,
            descriptor.describe()
        ));
        self.state()
    }

    /// Ask the adapter to pause the debuggee. Does nothing unless running;
    /// never waits for the adapter.
    pub fn break_into(&self) {
        let failure = {
            let mut data = lock(&self.inner.data);
            if data.machine.state() != SessionState::Running {
                debug!(state = %data.machine.state(), "interrupt ignored");
                return;
            }
            let Some(channel) = data.channel.clone() else {
                return;
            };
            let thread = data
                .stopped_thread
                .or_else(|| data.descriptor.as_ref().map(|d| d.pause_thread))
                .unwrap_or(0);
            match channel.pause(thread) {
                Ok(()) => {
                    debug!(thread, "pause sent");
                    if let Err(err) = data.machine.interrupt() {
                        debug!(error = %err, "interrupt after pause");
                    }
                    None
                }
                Err(err) => Some(err),
            }
        };
        if let Some(err) = failure {
            warn!(error = %err, "pause failed");
            self.output(&format!("pause failed: {err}"));
        }
    }

    /// Tear the session down: disconnect within the grace period, stop the
    /// event pump, close the console. Safe to call any number of times.
    pub async fn close_session(&self) -> SessionState {
        let mut closed = self.inner.closed.lock().await;
        if *closed {
            return self.state();
        }

        let (channel, terminate) = {
            let mut data = lock(&self.inner.data);
            if let Err(err) = data.machine.begin_close() {
                debug!(error = %err, "closing without an active session");
            }
            let terminate = data
                .descriptor
                .as_ref()
                .map_or(true, |d| matches!(d.target, DebuggeeTarget::Launch(_)));
            (data.channel.take(), terminate)
        };

        if let Some(channel) = channel {
            let grace = self.inner.settings.close_timeout;
            match tokio::time::timeout(grace, channel.disconnect(terminate)).await {
                Ok(Ok(())) => debug!("adapter disconnected"),
                Ok(Err(err)) => warn!(error = %err, "disconnect failed"),
                Err(_) => warn!(timeout_ms = grace.as_millis() as u64, "disconnect timed out"),
            }
        }
        if let Some(pump) = lock(&self.inner.event_task).take() {
            pump.abort();
        }
        self.inner.console.close();

        if let Err(err) = lock(&self.inner.data).machine.finish_close() {
            debug!(error = %err, "session already finished");
        }
        *closed = true;
        info!("session closed");
        self.state()
    }

    /// Read and execute lines until input ends, then close the session.
    pub async fn run(&self, dispatcher: &CommandDispatcher) -> Result<SessionState, SessionError> {
        let mut lines = self.inner.console.observe_lines()?;
        let mut interrupts = self.inner.console.observe_interrupts()?;

        let listener = self.clone();
        let interrupt_task = tokio::spawn(async move {
            while interrupts.next().await.is_some() {
                listener.break_into();
            }
        });

        loop {
            match lines.next().await {
                InputEvent::Line(line) => {
                    debug!(line = %line, "dispatching");
                    if let Err(err) = dispatcher.execute(&line).await {
                        self.output(&err.to_string());
                    }
                }
                InputEvent::Interrupt => self.break_into(),
                InputEvent::End => break,
            }
        }

        let state = self.close_session().await;
        interrupt_task.abort();
        Ok(state)
    }

    pub(crate) fn channel(&self) -> Result<Arc<dyn DebugChannel>, SessionError> {
        lock(&self.inner.data)
            .channel
            .clone()
            .ok_or(SessionError::NoActiveSession)
    }

    /// Thread the debuggee is stopped on; fails while it runs.
    pub(crate) fn stopped_thread(&self) -> Result<i64, SessionError> {
        let data = lock(&self.inner.data);
        if data.channel.is_none() {
            return Err(SessionError::NoActiveSession);
        }
        if data.machine.state() != SessionState::Interrupted {
            return Err(SessionError::NotStopped);
        }
        Ok(data
            .stopped_thread
            .or_else(|| data.descriptor.as_ref().map(|d| d.pause_thread))
            .unwrap_or(0))
    }

    pub(crate) fn current_thread(&self) -> Option<i64> {
        lock(&self.inner.data).stopped_thread
    }

    /// The debuggee was told to run again. Returns the thread it was
    /// stopped on.
    pub(crate) fn mark_resumed(&self) -> Option<i64> {
        let mut data = lock(&self.inner.data);
        match data.machine.resume() {
            Ok(()) => data.stopped_thread.take(),
            Err(err) => {
                debug!(error = %err, "resume ignored");
                None
            }
        }
    }

    /// A resume request was refused, so the debuggee is still where it
    /// stopped. A `stopped` event that arrived meanwhile wins.
    pub(crate) fn resume_failed(&self, thread: Option<i64>) {
        let mut data = lock(&self.inner.data);
        if data.machine.state() != SessionState::Running {
            return;
        }
        match data.machine.interrupt() {
            Ok(()) => data.stopped_thread = thread,
            Err(err) => debug!(error = %err, "could not restore the stopped state"),
        }
    }

    pub(crate) fn breakpoints(&self) -> MutexGuard<'_, BreakpointManager> {
        lock(&self.inner.breakpoints)
    }

    /// Send the breakpoints of `path` to the adapter, if one is connected.
    pub(crate) async fn sync_breakpoints(&self, path: &Path) -> Result<(), SessionError> {
        let Ok(channel) = self.channel() else {
            return Ok(());
        };
        let arguments = serde_json::to_value(self.breakpoints().request_for_file(path))?;
        let body = channel.request("setBreakpoints", Some(arguments)).await?;
        let responses = if body.is_null() {
            Vec::new()
        } else {
            serde_json::from_value::<SetBreakpointsResponseBody>(body)?.breakpoints
        };
        self.breakpoints().apply_response(path, &responses);
        Ok(())
    }

    async fn sync_all_breakpoints(&self) {
        let files = self.breakpoints().files();
        for path in files {
            if let Err(err) = self.sync_breakpoints(&path).await {
                warn!(path = %path.display(), error = %err, "setting breakpoints failed");
                self.output(&format!(
                    "could not set breakpoints in {}: {err}",
                    path.display()
                ));
            }
        }
    }

    async fn pump_events(self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            if let Err(err) = self.handle_event(&event) {
                warn!(event = %event.event, error = %err, "bad adapter event");
                self.output(&format!("adapter sent a bad {} event: {err}", event.event));
            }
        }
        debug!("adapter event stream ended");
    }

    fn handle_event(&self, event: &Event) -> Result<(), SessionError> {
        match event.event.as_str() {
            "output" => {
                let body: OutputEventBody = event.body_as()?;
                let category = body.category.as_deref().unwrap_or("console");
                let muted = self
                    .descriptor()
                    .is_some_and(|descriptor| descriptor.is_muted(category));
                if muted {
                    return Ok(());
                }
                for line in body.output.trim_end_matches(['\r', '\n']).lines() {
                    self.output(line);
                }
            }
            "stopped" => {
                let body: StoppedEventBody = event.body_as()?;
                {
                    let mut data = lock(&self.inner.data);
                    if body.thread_id.is_some() {
                        data.stopped_thread = body.thread_id;
                    }
                    if let Err(err) = data.machine.interrupt() {
                        debug!(error = %err, "stopped event ignored");
                        return Ok(());
                    }
                }
                let detail = body.description.or(body.text).unwrap_or(body.reason);
                match body.thread_id {
                    Some(thread) => self.output(&format!("stopped: {detail} (thread {thread})")),
                    None => self.output(&format!("stopped: {detail}")),
                }
            }
            "continued" => {
                let body: ContinuedEventBody = event.body_as()?;
                debug!(thread = body.thread_id, "continued");
                self.mark_resumed();
            }
            "breakpoint" => {
                let body: BreakpointEventBody = event.body_as()?;
                let message = self.breakpoints().apply_event(&body.breakpoint).map(|bp| {
                    let status = if bp.verified { "verified" } else { "pending" };
                    format!("breakpoint {} {}: {}", bp.id, status, bp.location())
                });
                if let Some(message) = message {
                    self.output(&message);
                }
            }
            "exited" => {
                let body: ExitedEventBody = event.body_as()?;
                info!(exit_code = body.exit_code, "debuggee exited");
                self.output(&format!("debuggee exited with code {}", body.exit_code));
            }
            "terminated" => {
                info!("adapter reported termination");
                self.output("debug session ended; type 'quit' to exit");
            }
            other => debug!(event = other, "unhandled adapter event"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use serde_json::json;
    use termdbg_adapter::AttachOptions;
    use termdbg_console::ScriptedConsole;

    use super::*;
    use crate::fake::{launch_descriptor, FakeChannel, FakeConnector};

    fn python_descriptor() -> AdapterDescriptor {
        launch_descriptor("python", "app.py")
    }

    fn setup() -> (Debugger, Arc<ScriptedConsole>, Arc<FakeChannel>) {
        let console = Arc::new(ScriptedConsole::new());
        let channel = Arc::new(FakeChannel::new());
        let connector = Arc::new(FakeConnector::new(channel.clone()));
        let debugger = Debugger::new(console.clone(), connector, DebuggerSettings::default());
        (debugger, console, channel)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn launch_reaches_running_with_banner() {
        let (debugger, console, _channel) = setup();
        assert_eq!(debugger.state(), SessionState::Uninitialized);
        assert_eq!(debugger.launch(python_descriptor()).await, SessionState::Running);
        assert!(console.output_contains("python session started: launch app.py"));
        assert!(debugger.last_error().is_none());
    }

    #[tokio::test]
    async fn failed_launch_reports_and_terminates() {
        let console = Arc::new(ScriptedConsole::new());
        let connector = Arc::new(FakeConnector::failing("adapter not found"));
        let debugger = Debugger::new(console.clone(), connector, DebuggerSettings::default());

        let state = debugger.launch(python_descriptor()).await;
        assert_eq!(state, SessionState::Terminated);
        let err = debugger.last_error().unwrap();
        assert!(err.contains("adapter not found"), "{err}");
        assert!(console.output_contains("could not start the python adapter"));
        // The console stays usable for help output until closed.
        assert_eq!(console.close_count(), 0);
    }

    #[tokio::test]
    async fn second_launch_is_refused() {
        let (debugger, console, _channel) = setup();
        debugger.launch(python_descriptor()).await;
        assert_eq!(debugger.launch(python_descriptor()).await, SessionState::Running);
        assert!(console.output_contains("cannot launch while the session is running"));
    }

    #[tokio::test]
    async fn break_into_is_noop_without_running_session() {
        let (debugger, _console, channel) = setup();
        debugger.break_into();
        assert_eq!(debugger.state(), SessionState::Uninitialized);

        debugger.close_session().await;
        debugger.break_into();
        assert_eq!(debugger.state(), SessionState::Terminated);
        assert!(channel.pauses().is_empty());
    }

    #[tokio::test]
    async fn break_into_pauses_once() {
        let (debugger, _console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        debugger.break_into();
        assert_eq!(debugger.state(), SessionState::Interrupted);
        debugger.break_into();
        assert_eq!(debugger.state(), SessionState::Interrupted);
        assert_eq!(channel.pauses(), vec![0]);
    }

    #[tokio::test]
    async fn close_session_is_idempotent() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        assert_eq!(debugger.close_session().await, SessionState::Terminated);
        assert_eq!(debugger.close_session().await, SessionState::Terminated);
        assert_eq!(channel.disconnects(), vec![true]);
        assert_eq!(console.close_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_closes_tear_down_once() {
        let (debugger, _console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        let (a, b) = tokio::join!(debugger.close_session(), debugger.close_session());
        assert_eq!(a, SessionState::Terminated);
        assert_eq!(b, SessionState::Terminated);
        assert_eq!(channel.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_disconnect_is_bounded_by_close_timeout() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;
        channel.hang_on_disconnect();

        let started = tokio::time::Instant::now();
        assert_eq!(debugger.close_session().await, SessionState::Terminated);
        assert!(started.elapsed() >= DebuggerSettings::default().close_timeout);
        assert!(console.is_closed());
        assert_eq!(channel.disconnects(), vec![true]);
    }

    #[tokio::test]
    async fn close_without_adapter_still_closes_console() {
        let (debugger, console, channel) = setup();
        assert_eq!(debugger.close_session().await, SessionState::Terminated);
        assert_eq!(console.close_count(), 1);
        assert_eq!(channel.disconnect_count(), 0);
    }

    #[tokio::test]
    async fn stopped_and_continued_events_drive_state() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        channel.emit("stopped", json!({ "reason": "breakpoint", "threadId": 7 }));
        settle().await;
        assert_eq!(debugger.state(), SessionState::Interrupted);
        assert!(console.output_contains("stopped: breakpoint (thread 7)"));
        assert_eq!(debugger.stopped_thread().unwrap(), 7);

        channel.emit("continued", json!({ "threadId": 7 }));
        settle().await;
        assert_eq!(debugger.state(), SessionState::Running);

        debugger.break_into();
        assert_eq!(channel.pauses(), vec![0]);
    }

    #[tokio::test]
    async fn muted_output_is_dropped() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        channel.emit("output", json!({ "category": "telemetry", "output": "ping\n" }));
        channel.emit("output", json!({ "category": "stdout", "output": "hello\nworld\n" }));
        settle().await;

        assert!(!console.output_contains("ping"));
        assert!(console.output_contains("hello"));
        assert!(console.output_contains("world"));
    }

    #[tokio::test]
    async fn terminated_event_keeps_session_open() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        channel.emit("exited", json!({ "exitCode": 3 }));
        channel.emit("terminated", json!({}));
        settle().await;

        assert!(console.output_contains("debuggee exited with code 3"));
        assert_eq!(debugger.state(), SessionState::Running);
        assert_eq!(console.close_count(), 0);
    }

    #[tokio::test]
    async fn malformed_event_is_reported_inline() {
        let (debugger, console, channel) = setup();
        debugger.launch(python_descriptor()).await;

        channel.emit("exited", json!({ "exitCode": "soon" }));
        settle().await;
        assert!(console.output_contains("adapter sent a bad exited event"));
        assert_eq!(debugger.state(), SessionState::Running);
    }

    #[tokio::test]
    async fn breakpoints_set_before_launch_are_sent() {
        let (debugger, _console, channel) = setup();
        let path = PathBuf::from("/src/app.py");
        debugger.breakpoints().add(path.clone(), 12, None);
        channel.respond(
            "setBreakpoints",
            json!({ "breakpoints": [{ "id": 1, "verified": true, "line": 12 }] }),
        );

        debugger.launch(python_descriptor()).await;
        assert_eq!(channel.request_count("setBreakpoints"), 1);
        assert!(debugger.breakpoints().get_for_file(&path)[0].verified);
    }

    #[tokio::test]
    async fn attach_session_does_not_terminate_debuggee() {
        let (debugger, _console, channel) = setup();
        let mut descriptor = python_descriptor();
        descriptor.target = DebuggeeTarget::Attach(AttachOptions {
            pid: Some(99),
            host: None,
            port: None,
        });
        debugger.launch(descriptor).await;
        assert_eq!(debugger.close_session().await, SessionState::Terminated);
        assert_eq!(channel.disconnects(), vec![false]);
    }
}

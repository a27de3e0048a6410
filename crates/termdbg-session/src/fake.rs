//! In-memory adapter doubles for tests.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use termdbg_adapter::{AdapterConnector, AdapterDescriptor, DebuggeeTarget, LaunchOptions};
use termdbg_dap::{AdapterProcess, DapError, DebugChannel, Event};
use tokio::sync::{mpsc, Notify};

/// A launch descriptor for `program` that spawns nothing real.
pub fn launch_descriptor(adapter_type: &str, program: &str) -> AdapterDescriptor {
    AdapterDescriptor {
        adapter_type: adapter_type.to_string(),
        target: DebuggeeTarget::Launch(LaunchOptions {
            program: program.to_string(),
            args: Vec::new(),
            cwd: None,
            stop_on_entry: false,
        }),
        executable: AdapterProcess {
            program: format!("fake-{adapter_type}-adapter"),
            args: Vec::new(),
            adapter_id: adapter_type.to_string(),
        },
        request_arguments: serde_json::json!({ "program": program }),
        mute_output_categories: BTreeSet::from(["telemetry".to_string()]),
        pause_thread: 0,
    }
}

/// A channel that records requests and answers from a canned table.
pub struct FakeChannel {
    requests: Mutex<Vec<(String, Option<serde_json::Value>)>>,
    responses: Mutex<HashMap<String, serde_json::Value>>,
    pauses: Mutex<Vec<i64>>,
    /// `terminate_debuggee` of every `disconnect`.
    disconnects: Mutex<Vec<bool>>,
    failures: Mutex<HashMap<String, String>>,
    /// Event sent from inside a request, before its answer.
    emitted_during: Mutex<HashMap<String, (String, serde_json::Value)>>,
    held: Mutex<HashMap<String, Arc<Notify>>>,
    disconnect_hangs: AtomicBool,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeChannel {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            pauses: Mutex::new(Vec::new()),
            disconnects: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            emitted_during: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
            disconnect_hangs: AtomicBool::new(false),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Answer every `command` request with `body`.
    pub fn respond(&self, command: &str, body: serde_json::Value) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.to_string(), body);
    }

    /// Fail every `command` request with a transport error.
    pub fn fail(&self, command: &str, message: &str) {
        lock(&self.failures).insert(command.to_string(), message.to_string());
    }

    /// Deliver `event` while a `command` request is in flight, the way
    /// adapters send `stopped` right behind a step response.
    pub fn emit_during(&self, command: &str, event: &str, body: serde_json::Value) {
        lock(&self.emitted_during).insert(command.to_string(), (event.to_string(), body));
    }

    /// Keep `command` requests waiting until the returned gate is notified.
    pub fn hold(&self, command: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.held).insert(command.to_string(), gate.clone());
        gate
    }

    /// Make `disconnect` record the call and then never finish.
    pub fn hang_on_disconnect(&self) {
        self.disconnect_hangs.store(true, Ordering::SeqCst);
    }

    /// Deliver an adapter event.
    pub fn emit(&self, event: &str, body: serde_json::Value) {
        let _ = self.events_tx.send(Event::new(event, Some(body)));
    }

    pub fn requests(&self) -> Vec<(String, Option<serde_json::Value>)> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn request_count(&self, command: &str) -> usize {
        self.requests()
            .iter()
            .filter(|(name, _)| name == command)
            .count()
    }

    /// Thread ids of every `pause`.
    pub fn pauses(&self) -> Vec<i64> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn disconnects(&self) -> Vec<bool> {
        self.disconnects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects().len()
    }
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DebugChannel for FakeChannel {
    async fn request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, DapError> {
        lock(&self.requests).push((command.to_string(), arguments));

        let gate = lock(&self.held).get(command).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let during = lock(&self.emitted_during).get(command).cloned();
        if let Some((event, body)) = during {
            self.emit(&event, body);
            for _ in 0..20 {
                tokio::task::yield_now().await;
            }
        }
        if let Some(message) = lock(&self.failures).get(command).cloned() {
            return Err(DapError::Transport(message));
        }
        Ok(lock(&self.responses)
            .get(command)
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    fn pause(&self, thread_id: i64) -> Result<(), DapError> {
        self.pauses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(thread_id);
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.events_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn disconnect(&self, terminate_debuggee: bool) -> Result<(), DapError> {
        self.disconnects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(terminate_debuggee);
        if self.disconnect_hangs.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Hands out one [`FakeChannel`], or fails every connection.
pub struct FakeConnector {
    channel: Arc<FakeChannel>,
    failure: Option<String>,
    connects: AtomicUsize,
}

impl FakeConnector {
    pub fn new(channel: Arc<FakeChannel>) -> Self {
        Self {
            channel,
            failure: None,
            connects: AtomicUsize::new(0),
        }
    }

    /// A connector whose adapter never starts.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            channel: Arc::new(FakeChannel::new()),
            failure: Some(message.into()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdapterConnector for FakeConnector {
    async fn connect(
        &self,
        _descriptor: &AdapterDescriptor,
    ) -> Result<Arc<dyn DebugChannel>, DapError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(DapError::Transport(message.clone())),
            None => Ok(self.channel.clone()),
        }
    }
}

//! Process-backed DAP client.
//!
//! Spawns the adapter, then runs a writer task draining an outgoing queue into
//! the adapter's stdin and a reader task routing responses to their waiting
//! requests and events to a single consumer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::channel::DebugChannel;
use crate::error::DapError;
use crate::protocol::{
    Capabilities, DisconnectArguments, Event, IncomingMessage, InitializeRequestArguments,
    Request, Response, ThreadArguments,
};
use crate::transport::{encode_message, read_message};

/// Time allowed for the adapter process to exit after `disconnect`.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// How to start an adapter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProcess {
    pub program: String,
    pub args: Vec<String>,
    /// Sent as `adapterID` in `initialize`.
    pub adapter_id: String,
}

/// Which session-start request to send after `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    Launch,
    Attach,
}

impl SessionRequest {
    pub fn command(self) -> &'static str {
        match self {
            SessionRequest::Launch => "launch",
            SessionRequest::Attach => "attach",
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<Response>>>>;

/// A connection to one adapter over a byte stream pair.
pub struct DapClient {
    writer_tx: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingMap,
    next_seq: Arc<AtomicI64>,
    events: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    initialized: watch::Receiver<bool>,
    capabilities: Mutex<Capabilities>,
    child: Mutex<Option<Child>>,
    request_timeout: Duration,
    disconnected: AtomicBool,
}

impl DapClient {
    /// Spawn the adapter process and wire up the I/O tasks. Must be called
    /// within a tokio runtime.
    pub fn spawn(process: &AdapterProcess, request_timeout: Duration) -> Result<Self, DapError> {
        debug!(program = %process.program, args = ?process.args, "spawning adapter");
        let mut child = TokioCommand::new(&process.program)
            .args(&process.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DapError::AdapterSpawnFailed {
                program: process.program.clone(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DapError::Transport("could not capture adapter stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DapError::Transport("could not capture adapter stdout".into()))?;

        let client = Self::from_streams(stdout, stdin, request_timeout);
        *client.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);
        Ok(client)
    }

    /// Build a client over an arbitrary reader/writer pair.
    pub fn from_streams<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (writer_tx, writer_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        let (init_tx, init_rx) = watch::channel(false);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let next_seq = Arc::new(AtomicI64::new(1));

        tokio::spawn(write_loop(writer, writer_rx));
        tokio::spawn(read_loop(
            BufReader::new(reader),
            ReaderState {
                pending: Arc::clone(&pending),
                events: event_tx,
                initialized: init_tx,
                writer: writer_tx.clone(),
                next_seq: Arc::clone(&next_seq),
            },
        ));

        Self {
            writer_tx,
            pending,
            next_seq,
            events: Mutex::new(Some(event_rx)),
            initialized: init_rx,
            capabilities: Mutex::new(Capabilities::default()),
            child: Mutex::new(None),
            request_timeout,
            disconnected: AtomicBool::new(false),
        }
    }

    /// Capabilities reported by `initialize`.
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run the start-up sequence: `initialize`, `launch`/`attach`, wait for
    /// the `initialized` event, `configurationDone`, then the launch answer.
    ///
    /// Adapters may hold the launch response until configuration is done,
    /// so the launch request is sent before waiting on anything else.
    pub async fn start_session(
        &self,
        adapter_id: &str,
        request: SessionRequest,
        arguments: serde_json::Value,
    ) -> Result<Capabilities, DapError> {
        let init_args = serde_json::to_value(InitializeRequestArguments::for_adapter(adapter_id))
            .map_err(|e| DapError::Transport(e.to_string()))?;
        let body = self.request_inner("initialize", Some(init_args)).await?;
        let caps: Capabilities = if body.is_null() {
            Capabilities::default()
        } else {
            serde_json::from_value(body)
                .map_err(|e| DapError::InvalidResponse(format!("initialize: {e}")))?
        };
        *self
            .capabilities
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = caps.clone();

        let (launch_seq, launch_rx) = self.send(request.command(), Some(arguments))?;
        self.wait_initialized(request.command()).await?;
        if caps.supports_configuration_done_request.unwrap_or(false) {
            self.request_inner("configurationDone", None).await?;
        }
        self.await_response(request.command(), launch_seq, launch_rx).await?;
        debug!(adapter = adapter_id, request = request.command(), "session started");
        Ok(caps)
    }

    fn next_seq(&self) -> i64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Queue a request and register for its response.
    fn send(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<(i64, oneshot::Receiver<Response>), DapError> {
        let seq = self.next_seq();
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(seq, tx);
        if let Err(e) = self.enqueue(Request::new(seq, command, arguments)) {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&seq);
            return Err(e);
        }
        Ok((seq, rx))
    }

    fn enqueue(&self, request: Request) -> Result<(), DapError> {
        trace!(seq = request.seq, command = %request.command, "-> request");
        let value = serde_json::to_value(&request).map_err(|e| DapError::Transport(e.to_string()))?;
        self.writer_tx
            .send(encode_message(&value))
            .map_err(|_| DapError::Disconnected)
    }

    /// Wait for the answer to request `seq`; a timed-out request is
    /// dropped from the pending table.
    async fn await_response(
        &self,
        command: &str,
        seq: i64,
        rx: oneshot::Receiver<Response>,
    ) -> Result<serde_json::Value, DapError> {
        let response = match timeout(self.request_timeout, rx).await {
            Ok(received) => received.map_err(|_| DapError::Disconnected)?,
            Err(_) => {
                self.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&seq);
                debug!(seq, command, "request timed out");
                return Err(DapError::Timeout {
                    command: command.to_string(),
                });
            }
        };
        if response.success {
            Ok(response.body.unwrap_or(serde_json::Value::Null))
        } else {
            Err(DapError::Rejected {
                command: command.to_string(),
                message: response
                    .message
                    .unwrap_or_else(|| "request failed".to_string()),
            })
        }
    }

    async fn request_inner(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, DapError> {
        let (seq, rx) = self.send(command, arguments)?;
        self.await_response(command, seq, rx).await
    }

    async fn wait_initialized(&self, command: &str) -> Result<(), DapError> {
        let mut initialized = self.initialized.clone();
        let waited = timeout(self.request_timeout, async move {
            initialized.wait_for(|done| *done).await.map(|_| ())
        })
        .await;
        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DapError::Disconnected),
            Err(_) => Err(DapError::Timeout {
                command: format!("{command} (waiting for initialized)"),
            }),
        }
    }

    fn take_child(&self) -> Option<Child> {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[async_trait]
impl DebugChannel for DapClient {
    async fn request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, DapError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(DapError::Disconnected);
        }
        self.request_inner(command, arguments).await
    }

    fn pause(&self, thread_id: i64) -> Result<(), DapError> {
        let args = serde_json::to_value(ThreadArguments { thread_id })
            .map_err(|e| DapError::Transport(e.to_string()))?;
        // Fire and forget: the answer is dropped by the reader.
        self.enqueue(Request::new(self.next_seq(), "pause", Some(args)))
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<Event>> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    async fn disconnect(&self, terminate_debuggee: bool) -> Result<(), DapError> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let args = serde_json::to_value(DisconnectArguments {
            restart: Some(false),
            terminate_debuggee: Some(terminate_debuggee),
        })
        .map_err(|e| DapError::Transport(e.to_string()))?;
        let result = self.request_inner("disconnect", Some(args)).await;
        if let Err(e) = &result {
            warn!(error = %e, "disconnect request failed");
        }

        if let Some(mut child) = self.take_child() {
            match timeout(EXIT_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "adapter exited"),
                _ => {
                    debug!("adapter still running, killing");
                    let _ = child.kill().await;
                }
            }
        }
        result.map(|_| ())
    }
}

impl Drop for DapClient {
    fn drop(&mut self) {
        if let Some(mut child) = self.take_child() {
            let _ = child.start_kill();
        }
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Vec<u8>>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if writer.write_all(&frame).await.is_err() || writer.flush().await.is_err() {
            warn!("adapter stdin closed");
            break;
        }
    }
}

struct ReaderState {
    pending: PendingMap,
    events: mpsc::UnboundedSender<Event>,
    initialized: watch::Sender<bool>,
    writer: mpsc::UnboundedSender<Vec<u8>>,
    next_seq: Arc<AtomicI64>,
}

async fn read_loop<R>(mut reader: BufReader<R>, state: ReaderState)
where
    R: AsyncRead + Unpin,
{
    loop {
        let value = match read_message(&mut reader).await {
            Ok(Some(value)) => value,
            Ok(None) => break,
            Err(DapError::InvalidResponse(e)) => {
                warn!(error = %e, "skipping malformed adapter message");
                continue;
            }
            Err(e) => {
                warn!(error = %e, "adapter stream failed");
                break;
            }
        };
        match IncomingMessage::from_value(value) {
            Ok(IncomingMessage::Response(response)) => {
                trace!(seq = response.request_seq, command = %response.command, "<- response");
                let waiter = state
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&response.request_seq);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => trace!(command = %response.command, "unawaited response"),
                }
            }
            Ok(IncomingMessage::Event(event)) => {
                trace!(event = %event.event, "<- event");
                if event.event == "initialized" {
                    let _ = state.initialized.send(true);
                }
                // A dropped consumer only means nobody listens to events.
                let _ = state.events.send(event);
            }
            Ok(IncomingMessage::Request(request)) => {
                debug!(command = %request.command, "rejecting reverse request");
                let seq = state.next_seq.fetch_add(1, Ordering::SeqCst);
                if let Ok(value) = serde_json::to_value(Response::unsupported(seq, &request)) {
                    let _ = state.writer.send(encode_message(&value));
                }
            }
            Err(e) => warn!(error = %e, "ignoring unrecognised adapter message"),
        }
    }
    debug!("adapter output closed");
    // Fail every outstanding request.
    state
        .pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

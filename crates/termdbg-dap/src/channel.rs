use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DapError;
use crate::protocol::Event;

/// A live connection to a debug adapter.
///
/// The session controller is the only owner; every method takes `&self` so
/// the channel can be shared with the event pump and interrupt listener.
#[async_trait]
pub trait DebugChannel: Send + Sync {
    /// Send a request and wait for its response body (`Null` when absent).
    async fn request(
        &self,
        command: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, DapError>;

    /// Ask the adapter to suspend `thread_id`. Never waits for an answer.
    fn pause(&self, thread_id: i64) -> Result<(), DapError>;

    /// The adapter's event stream. Yields `Some` only on the first call.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<Event>>;

    /// End the connection, optionally terminating the debuggee. Calling it
    /// again is a no-op.
    async fn disconnect(&self, terminate_debuggee: bool) -> Result<(), DapError>;
}

//! termdbg-dap: Debug Adapter Protocol client.
//!
//! Protocol types, Content-Length message framing, the [`DebugChannel`]
//! contract the session controller talks to, and a process-backed
//! implementation of it.

pub mod breakpoint;
pub mod channel;
pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use breakpoint::{Breakpoint, BreakpointManager};
pub use channel::DebugChannel;
pub use client::{AdapterProcess, DapClient, SessionRequest};
pub use error::DapError;
pub use protocol::*;

//! termdbg-adapter: from command-line arguments to a running adapter.
//!
//! The factory parses the command line, picks an adapter type and folds
//! its options into an [`AdapterDescriptor`]; a connector turns the
//! descriptor into a live [`termdbg_dap::DebugChannel`].

pub mod adapters;
pub mod args;
pub mod connector;
pub mod descriptor;
pub mod error;
pub mod factory;

pub use adapters::DebuggerAdapter;
pub use args::{AdapterFlag, CoreArgs, FlagMode, FlagValues, ParsedArgs};
pub use connector::{AdapterConnector, ProcessConnector};
pub use descriptor::{AdapterDescriptor, AttachOptions, DebuggeeTarget, LaunchOptions};
pub use error::{ArgumentError, ResolutionError};
pub use factory::DebuggerAdapterFactory;

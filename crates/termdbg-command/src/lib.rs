//! termdbg-command: the command registry and line dispatcher.

pub mod alias;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod registry;

pub use alias::AliasTable;
pub use command::{BoxError, Command, CommandInfo};
pub use dispatcher::{CommandDispatcher, CommandListing};
pub use error::{CommandError, DispatchError};
pub use registry::CommandRegistry;

use thiserror::Error;

use crate::command::BoxError;

/// Registration errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The name or alias is already taken by `existing`.
    #[error("command '{name}' conflicts with already registered command '{existing}'")]
    DuplicateCommand { name: String, existing: String },

    #[error("command name must not be empty")]
    EmptyName,
}

/// Errors produced while dispatching one input line.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown command '{0}' (type 'help' for a list of commands)")]
    UnknownCommand(String),

    #[error("{command}: {source}")]
    CommandExecution {
        command: String,
        #[source]
        source: BoxError,
    },
}

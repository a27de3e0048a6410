use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::debug;

use crate::alias::AliasTable;
use crate::command::{Command, CommandInfo};
use crate::error::{CommandError, DispatchError};
use crate::registry::CommandRegistry;

/// Parses input lines and runs the matching command.
///
/// The dispatcher never writes output; results and failures are returned to
/// the caller.
pub struct CommandDispatcher {
    registry: Arc<RwLock<CommandRegistry>>,
    aliases: AliasTable,
}

impl CommandDispatcher {
    /// Build a dispatcher with the given alias table (alias to tokens).
    pub fn new(aliases: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(CommandRegistry::new())),
            aliases: AliasTable::new(aliases),
        }
    }

    pub fn register_command(&self, command: Arc<dyn Command>) -> Result<(), CommandError> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(command)
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(name)
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Read-only handle on the registry for commands that list other
    /// commands. Holding it does not keep the dispatcher alive.
    pub fn listing(&self) -> CommandListing {
        CommandListing {
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Run one line of user input.
    ///
    /// Blank lines are a no-op. The first token goes through alias
    /// expansion, and the remaining tokens become the command's arguments.
    pub async fn execute(&self, raw_line: &str) -> Result<(), DispatchError> {
        let mut tokens = raw_line.split_whitespace();
        let Some(first) = tokens.next() else {
            return Ok(());
        };

        let mut words: Vec<String> = match self.aliases.get(first) {
            Some(expansion) => {
                debug!(alias = first, ?expansion, "expanding alias");
                expansion.to_vec()
            }
            None => vec![first.to_string()],
        };
        words.extend(tokens.map(String::from));

        let name = words.remove(0);
        let command = self
            .lookup(&name)
            .ok_or_else(|| DispatchError::UnknownCommand(name.clone()))?;

        debug!(command = command.name(), args = ?words, "dispatching");
        command
            .execute(&words)
            .await
            .map_err(|source| DispatchError::CommandExecution {
                command: command.name().to_string(),
                source,
            })
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(BTreeMap::new())
    }
}

/// Weak view of a dispatcher's registry.
#[derive(Debug, Clone)]
pub struct CommandListing {
    registry: Weak<RwLock<CommandRegistry>>,
}

impl CommandListing {
    /// Registered commands in registration order; empty once the dispatcher
    /// is gone.
    pub fn commands(&self) -> Vec<CommandInfo> {
        self.registry
            .upgrade()
            .map(|r| r.read().unwrap_or_else(PoisonError::into_inner).infos())
            .unwrap_or_default()
    }

    /// Look up a single command by name or alias.
    pub fn find(&self, name: &str) -> Option<CommandInfo> {
        let registry = self.registry.upgrade()?;
        let guard = registry.read().unwrap_or_else(PoisonError::into_inner);
        guard.lookup(name).map(|c| CommandInfo::of(c.as_ref()))
    }
}

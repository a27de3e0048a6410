//! Registry of installed commands.
//!
//! Names and aliases share one case-insensitive namespace. Insertion order is
//! kept only so `help` can list commands in the order they were registered.
use std::collections::HashMap;
use std::sync::Arc;

use crate::command::{Command, CommandInfo};
use crate::error::CommandError;

pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
    /// Lower-cased name to index in `commands`.
    names: HashMap<String, usize>,
    /// Lower-cased alias to index in `commands`.
    aliases: HashMap<String, usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            names: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Install `command`. On any conflict nothing is inserted.
    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), CommandError> {
        let name = command.name().to_lowercase();
        if name.trim().is_empty() {
            return Err(CommandError::EmptyName);
        }
        let aliases: Vec<String> = command.aliases().iter().map(|a| a.to_lowercase()).collect();

        let mut claimed: Vec<&str> = Vec::with_capacity(aliases.len() + 1);
        for key in std::iter::once(&name).chain(aliases.iter()) {
            if let Some(existing) = self.owner_of(key) {
                return Err(CommandError::DuplicateCommand {
                    name: key.clone(),
                    existing: existing.to_string(),
                });
            }
            if claimed.contains(&key.as_str()) {
                return Err(CommandError::DuplicateCommand {
                    name: key.clone(),
                    existing: command.name().to_string(),
                });
            }
            claimed.push(key);
        }

        let index = self.commands.len();
        self.names.insert(name, index);
        for alias in aliases {
            self.aliases.insert(alias, index);
        }
        tracing::debug!(command = command.name(), "registered command");
        self.commands.push(command);
        Ok(())
    }

    /// Case-insensitive lookup; names win over aliases.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Command>> {
        let key = name.to_lowercase();
        self.names
            .get(&key)
            .or_else(|| self.aliases.get(&key))
            .map(|&i| Arc::clone(&self.commands[i]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Commands in registration order.
    pub fn infos(&self) -> Vec<CommandInfo> {
        self.commands
            .iter()
            .map(|c| CommandInfo::of(c.as_ref()))
            .collect()
    }

    fn owner_of(&self, key: &str) -> Option<&str> {
        self.names
            .get(key)
            .or_else(|| self.aliases.get(key))
            .map(|&i| self.commands[i].name())
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.len())
            .field("aliases", &self.aliases.len())
            .finish()
    }
}

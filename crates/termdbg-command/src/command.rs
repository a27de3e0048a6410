use async_trait::async_trait;

/// Error type returned by command bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A named, executable unit installed into the dispatcher.
#[async_trait]
pub trait Command: Send + Sync {
    /// Canonical name, matched case-insensitively.
    fn name(&self) -> &str;

    /// Alternative names.
    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description shown by `help`.
    fn help_text(&self) -> &str;

    /// Run with the whitespace-split arguments that followed the name.
    async fn execute(&self, args: &[String]) -> Result<(), BoxError>;
}

/// Read-only snapshot of a registered command, used for help output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    pub name: String,
    pub aliases: Vec<String>,
    pub help: String,
}

impl CommandInfo {
    pub(crate) fn of(command: &dyn Command) -> Self {
        Self {
            name: command.name().to_string(),
            aliases: command.aliases().iter().map(|a| a.to_string()).collect(),
            help: command.help_text().to_string(),
        }
    }

    /// `name (a, b)` or just `name`.
    pub fn signature(&self) -> String {
        if self.aliases.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, self.aliases.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_lists_aliases() {
        let info = CommandInfo {
            name: "backtrace".into(),
            aliases: vec!["bt".into(), "where".into()],
            help: "show the call stack".into(),
        };
        assert_eq!(info.signature(), "backtrace (bt, where)");
    }

    #[test]
    fn signature_without_aliases() {
        let info = CommandInfo {
            name: "threads".into(),
            aliases: vec![],
            help: String::new(),
        };
        assert_eq!(info.signature(), "threads");
    }
}

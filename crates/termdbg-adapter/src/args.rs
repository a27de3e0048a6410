//! Command-line model shared by the factory and the binary.

use std::collections::BTreeMap;

use clap::Args;

/// Flags understood regardless of the adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct CoreArgs {
    /// Show help, for the selected adapter when one can be identified.
    #[arg(long, short = 'h')]
    pub help: bool,

    /// Attach to a running process instead of launching a program.
    #[arg(long)]
    pub attach: bool,

    /// Adapter type; inferred from the program suffix when omitted.
    #[arg(long = "type", value_name = "TYPE")]
    pub adapter_type: Option<String>,

    /// Read further arguments from a configured preset.
    #[arg(long, value_name = "NAME")]
    pub preset: Option<String>,

    /// Line-oriented mode: no raw terminal, interrupts from SIGINT.
    #[arg(long)]
    pub plain: bool,

    /// Program to debug, followed by its own arguments.
    #[arg(
        value_name = "PROGRAM",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command_line: Vec<String>,
}

/// When an adapter flag is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagMode {
    Launch,
    Attach,
}

/// A flag contributed by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterFlag {
    /// Long name without the leading dashes; also the clap id.
    pub name: &'static str,
    /// `None` for switches.
    pub value_name: Option<&'static str>,
    pub help: &'static str,
    pub mode: FlagMode,
}

impl AdapterFlag {
    pub fn signature(&self) -> String {
        match self.value_name {
            Some(value) => format!("--{} <{}>", self.name, value),
            None => format!("--{}", self.name),
        }
    }
}

pub const CWD: AdapterFlag = AdapterFlag {
    name: "cwd",
    value_name: Some("DIR"),
    help: "Working directory of the debuggee",
    mode: FlagMode::Launch,
};

pub const STOP_ON_ENTRY: AdapterFlag = AdapterFlag {
    name: "stop-on-entry",
    value_name: None,
    help: "Stop at the first line of the program",
    mode: FlagMode::Launch,
};

pub const PID: AdapterFlag = AdapterFlag {
    name: "pid",
    value_name: Some("PID"),
    help: "Process id to attach to",
    mode: FlagMode::Attach,
};

pub const HOST: AdapterFlag = AdapterFlag {
    name: "host",
    value_name: Some("HOST"),
    help: "Host of the debug server to attach to",
    mode: FlagMode::Attach,
};

pub const PORT: AdapterFlag = AdapterFlag {
    name: "port",
    value_name: Some("PORT"),
    help: "Port of the debug server to attach to",
    mode: FlagMode::Attach,
};

/// Values of the adapter flags present on the command line.
///
/// Switches map to `None`, valued flags to their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagValues {
    values: BTreeMap<String, Option<String>>,
}

impl FlagValues {
    pub fn insert(&mut self, name: &str, value: Option<String>) {
        self.values.insert(name.to_string(), value);
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(|v| v.as_deref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Output of [`crate::DebuggerAdapterFactory::parse_arguments`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedArgs {
    pub core: CoreArgs,
    pub flags: FlagValues,
}

impl ParsedArgs {
    pub fn program(&self) -> Option<&str> {
        self.core.command_line.first().map(String::as_str)
    }

    pub fn program_args(&self) -> &[String] {
        self.core.command_line.get(1..).unwrap_or(&[])
    }

    /// Nothing names a debuggee: the REPL runs without an adapter.
    pub fn names_no_target(&self) -> bool {
        !self.core.attach
            && self.core.adapter_type.is_none()
            && self.program().is_none()
            && self.flags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_signature() {
        assert_eq!(CWD.signature(), "--cwd <DIR>");
        assert_eq!(STOP_ON_ENTRY.signature(), "--stop-on-entry");
    }

    #[test]
    fn program_and_args_split() {
        let args = ParsedArgs {
            core: CoreArgs {
                command_line: vec!["app.py".into(), "-v".into(), "x".into()],
                ..CoreArgs::default()
            },
            flags: FlagValues::default(),
        };
        assert_eq!(args.program(), Some("app.py"));
        assert_eq!(args.program_args(), ["-v".to_string(), "x".to_string()]);
        assert!(!args.names_no_target());
        assert!(ParsedArgs::default().names_no_target());
        assert!(ParsedArgs::default().program_args().is_empty());
    }

    #[test]
    fn flag_values_track_switches() {
        let mut flags = FlagValues::default();
        flags.insert("stop-on-entry", None);
        flags.insert("cwd", Some("/tmp".into()));
        assert!(flags.is_set("stop-on-entry"));
        assert_eq!(flags.value("stop-on-entry"), None);
        assert_eq!(flags.value("cwd"), Some("/tmp"));
        assert_eq!(flags.names().collect::<Vec<_>>(), vec!["cwd", "stop-on-entry"]);
    }
}

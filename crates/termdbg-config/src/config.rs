use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Log verbosity level.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    /// Override the log file location.
    pub file: Option<PathBuf>,
}

/// Debug-session timing knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long `close_session` waits for the adapter to acknowledge a
    /// disconnect before giving up (100..=60000 ms).
    #[serde(default = "default_close_timeout_ms")]
    pub close_timeout_ms: u64,
    /// Timeout for a single adapter request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_close_timeout_ms() -> u64 {
    2_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            close_timeout_ms: default_close_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// A named argument vector, selected with `--preset <name>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    /// Arguments spliced into the command line in place of `--preset`.
    #[serde(default)]
    pub args: Vec<String>,
    /// Shown next to the preset name in usage output.
    pub description: Option<String>,
}

/// Override for the executable that speaks the debug adapter protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Top-level termdbg configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Command-line aliases: alias → replacement text.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
    #[serde(default)]
    pub presets: BTreeMap<String, Preset>,
    /// Per-adapter-type executable overrides.
    #[serde(default)]
    pub adapters: BTreeMap<String, AdapterEntry>,
}

impl Config {
    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    /// Alias table as token sequences, ready for the command dispatcher.
    pub fn alias_tokens(&self) -> BTreeMap<String, Vec<String>> {
        self.aliases
            .iter()
            .map(|(alias, expansion)| {
                let tokens = expansion.split_whitespace().map(str::to_string).collect();
                (alias.clone(), tokens)
            })
            .collect()
    }
}

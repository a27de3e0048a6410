use thiserror::Error;

/// The command line could not be turned into [`crate::ParsedArgs`].
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("{0}")]
    Parse(String),

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

impl From<clap::Error> for ArgumentError {
    fn from(err: clap::Error) -> Self {
        ArgumentError::Parse(err.render().to_string().trim_end().to_string())
    }
}

/// Parsed arguments that do not name a usable adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("--attach requires an explicit --type")]
    MissingTypeForAttach,

    #[error("'{program}' matches several adapter types ({}); choose one with --type", candidates.join(", "))]
    AmbiguousAdapterType {
        program: String,
        candidates: Vec<String>,
    },

    #[error("{0}")]
    UnknownAdapterType(String),

    #[error("{adapter}: {message}")]
    InvalidOptions { adapter: String, message: String },
}

impl ResolutionError {
    pub(crate) fn invalid(adapter: &str, message: impl Into<String>) -> Self {
        ResolutionError::InvalidOptions {
            adapter: adapter.to_string(),
            message: message.into(),
        }
    }
}

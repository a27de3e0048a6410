//! termdbg-platform: filesystem locations and log-file housekeeping.

pub mod error;
pub mod logging;
pub mod paths;

pub use error::PlatformError;
pub use logging::{prepare_log_file, LogFileSettings};
pub use paths::{DefaultPaths, PlatformPaths};

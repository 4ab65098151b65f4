//! CLI error type and exit codes.

use std::fmt;

use patchsync::config::ConfigError;
use patchsync::fetch::FetchError;
use patchsync::logging::LoggingError;

/// Exit code when at least one source failed.
pub const EXIT_SOURCES_FAILED: i32 = 1;

/// Exit code for configuration and setup errors.
pub const EXIT_SETUP: i32 = 2;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid command-line usage or configuration.
    Config(String),

    /// The configuration file could not be loaded.
    ConfigFile(ConfigError),

    /// Logging could not be initialized.
    Logging(LoggingError),

    /// The HTTP client could not be created.
    Http(FetchError),

    /// Some sources did not complete.
    SourcesFailed { failed: usize, total: usize },

    /// Writing command output failed.
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::SourcesFailed { .. } => EXIT_SOURCES_FAILED,
            _ => EXIT_SETUP,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "{}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Http(e) => write!(f, "{}", e),
            CliError::SourcesFailed { failed, total } => {
                write!(f, "{} of {} sources failed", failed, total)
            }
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Http(e)
    }
}

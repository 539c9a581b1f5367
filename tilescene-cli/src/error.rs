//! CLI error type.

use std::fmt;

use tilescene::config::ConfigError;
use tilescene::logging::LoggingError;
use tilescene::scene::SceneError;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Bad arguments or options file.
    Config(String),
    Logging(LoggingError),
    Scene(SceneError),
    /// The scene did not settle within the allowed time.
    Timeout { waiting_for: String, secs: u64 },
    /// Stopped by Ctrl-C.
    Interrupted,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Scene(e) => write!(f, "{}", e),
            CliError::Timeout { waiting_for, secs } => {
                write!(f, "Timed out after {}s waiting for {}", secs, waiting_for)
            }
            CliError::Interrupted => write!(f, "Interrupted"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Logging(e) => Some(e),
            CliError::Scene(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SceneError> for CliError {
    fn from(e: SceneError) -> Self {
        CliError::Scene(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

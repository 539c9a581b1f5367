//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scene description is not valid JSON for the expected schema.
    #[error("Failed to parse scene config: {0}")]
    Parse(#[from] serde_json::Error),

    /// INI options file could not be parsed.
    #[error("Failed to parse options file {path}: {reason}")]
    Ini { path: PathBuf, reason: String },

    /// An option had a value that could not be interpreted.
    #[error("Invalid value for [{section}] {key}: {value}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
    },

    /// Options are individually valid but inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            section: "workers".to_string(),
            key: "count".to_string(),
            value: "many".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid value for [workers] count: many");
    }
}

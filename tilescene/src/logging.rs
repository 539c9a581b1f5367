//! Logging setup.
//!
//! Installs a `tracing` subscriber with:
//! - an `EnvFilter` (`RUST_LOG` wins over the configured level)
//! - a stderr layer with local-time timestamps
//! - an optional daily-rolling file layer, written from a background thread
//! - a Chrome trace layer when built with the `profiling` feature
//!
//! # INI Format
//!
//! ```ini
//! [logging]
//! level = debug
//! dir = /var/log/tilescene
//! file_prefix = tilescene.log
//! ansi = true
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ConfigError;

/// Default log level when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default file name prefix for rolling log files.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "tilescene.log";

/// Errors from logging initialization.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Logging options.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `tilescene=debug,warn`.
    pub level: String,

    /// Directory for rolling log files. No file logging if unset.
    pub log_dir: Option<PathBuf>,

    pub file_prefix: String,

    /// Colored stderr output.
    pub ansi: bool,

    /// Chrome trace output path.
    #[cfg(feature = "profiling")]
    pub chrome_trace: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            log_dir: None,
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
            ansi: true,
            #[cfg(feature = "profiling")]
            chrome_trace: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.log_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Reads the `[logging]` section, keeping defaults for missing keys.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(section) = ini.section(Some("logging")) else {
            return Ok(config);
        };

        if let Some(level) = section.get("level") {
            config.level = level.trim().to_string();
        }
        if let Some(dir) = section.get("dir") {
            let dir = dir.trim();
            if !dir.is_empty() {
                config.log_dir = Some(PathBuf::from(dir));
            }
        }
        if let Some(prefix) = section.get("file_prefix") {
            config.file_prefix = prefix.trim().to_string();
        }
        if let Some(ansi) = section.get("ansi") {
            config.ansi = ansi
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    section: "logging".to_string(),
                    key: "ansi".to_string(),
                    value: ansi.to_string(),
                })?;
        }
        #[cfg(feature = "profiling")]
        if let Some(path) = section.get("chrome_trace") {
            config.chrome_trace = Some(PathBuf::from(path.trim()));
        }

        Ok(config)
    }
}

/// Keeps background log writers alive. Drop it last.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
    #[cfg(feature = "profiling")]
    _chrome: Option<tracing_chrome::FlushGuard>,
}

/// Installs the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| LoggingError::InvalidFilter {
            filter: config.level.clone(),
            reason: e.to_string(),
        })?,
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(LocalTime::rfc_3339())
        .with_ansi(config.ansi);

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::LogDir {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer);

    #[cfg(feature = "profiling")]
    let (registry, chrome_guard) = {
        let (layer, guard) = match &config.chrome_trace {
            Some(path) => {
                let (layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
                    .file(path)
                    .include_args(true)
                    .build();
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };
        (registry.with(layer), guard)
    };

    registry
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(LoggingGuard {
        _file: file_guard,
        #[cfg(feature = "profiling")]
        _chrome: chrome_guard,
    })
}

//! Common helpers shared across CLI commands.

use std::path::{Path, PathBuf};

use ini::Ini;
use tilescene::config::{load_ini, SceneOptions};
use tilescene::logging::LoggingConfig;

use crate::error::CliError;

/// Options file used when `--config` is not given.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("tilescene").join("tilescene.ini"))
}

/// Loads the options file.
///
/// An explicitly named file must exist. The default file is optional.
pub fn load_options_file(explicit: Option<&Path>) -> Result<Option<Ini>, CliError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "Options file not found: {}",
                    path.display()
                )));
            }
            Ok(Some(load_ini(path)?))
        }
        None => match default_config_path() {
            Some(path) if path.exists() => Ok(Some(load_ini(&path)?)),
            _ => Ok(None),
        },
    }
}

/// Scene options from the options file, or defaults.
pub fn scene_options(ini: Option<&Ini>) -> Result<SceneOptions, CliError> {
    match ini {
        Some(ini) => Ok(SceneOptions::from_ini(ini)?),
        None => Ok(SceneOptions::default()),
    }
}

/// Logging config from the options file, with the CLI level taking precedence.
pub fn logging_config(ini: Option<&Ini>, level: Option<&str>) -> Result<LoggingConfig, CliError> {
    let config = match ini {
        Some(ini) => LoggingConfig::from_ini(ini)?,
        None => LoggingConfig::default(),
    };
    Ok(match level {
        Some(level) => config.with_level(level),
        None => config,
    })
}

/// Parses `"a,b"` into two numbers.
pub fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let (a, b) = s
        .split_once(',')
        .ok_or_else(|| format!("expected two comma-separated numbers, got '{}'", s))?;
    let a = a.trim().parse::<f64>().map_err(|e| format!("'{}': {}", a, e))?;
    let b = b.trim().parse::<f64>().map_err(|e| format!("'{}': {}", b, e))?;
    Ok((a, b))
}

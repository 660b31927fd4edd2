// src/config/loader.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{RawShellConfig, ShellConfig};
use crate::errors::{Result, ShellError};

/// Read and deserialize a config file without semantic checks.
///
/// Use [`load_and_validate`] unless you need to patch the raw values first.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawShellConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawShellConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Read, apply serde defaults, and validate.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ShellConfig> {
    let raw = load_from_path(&path)?;
    ShellConfig::try_from(raw)
}

/// Like [`load_and_validate`], but a missing file yields the defaults.
///
/// An unreadable or invalid file is still an error.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ShellConfig> {
    match load_and_validate(&path) {
        Err(ShellError::IoError(e)) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.as_ref().display(), "no config file; using defaults");
            Ok(ShellConfig::default())
        }
        other => other,
    }
}

/// `shellrun.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("shellrun.toml")
}

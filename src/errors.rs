// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Only failures that happen *before* a process exists are surfaced as
//! `Err`. Anything that goes wrong after spawning (a missing executable, a
//! non-zero exit, a timeout) is reported on the execution result or the
//! session snapshot instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Directory {} does not exist", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Directory {} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to parse command '{command}': {reason}")]
    CommandParse { command: String, reason: String },

    #[error("Background session already exists: {0}")]
    SessionExists(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ShellError>;

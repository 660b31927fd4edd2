// src/config/mod.rs

//! Configuration for the command-execution layer.
//!
//! - [`model`] holds the serde types mapped from TOML.
//! - [`loader`] reads files.
//! - [`validate`] turns a `RawShellConfig` into a checked `ShellConfig`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{EnvSection, ProxyConfig, RawShellConfig, ShellConfig, ShellSection};

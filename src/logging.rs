// src/logging.rs

//! Logging setup for `shellrun` using `tracing` + `tracing-subscriber`.
//!
//! The filter comes from, in order:
//! 1. the level passed by the embedding application (usually
//!    `ShellConfig::log_level`), applied to every target
//! 2. the `SHELLRUN_LOG` environment variable, which takes full
//!    `EnvFilter` directives such as `shellrun=debug,warn`
//! 3. `info`
//!
//! Logs go to STDERR. Child process output never passes through the
//! logger except at `trace` level.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::types::LogLevel;

pub const LOG_ENV_VAR: &str = "SHELLRUN_LOG";

/// Install the global subscriber.
///
/// A second call returns an error instead of panicking, so embedding
/// applications that already set up `tracing` can ignore it.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let filter = match level {
        Some(lvl) => EnvFilter::new(directive(lvl)),
        None => EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info")),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(())
}

fn directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

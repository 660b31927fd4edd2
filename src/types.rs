// src/types.rs

use std::fmt;
use std::process::ExitStatus;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A command as supplied by the caller: either one shell string or an argv
/// list that will be quoted before it reaches the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandInput {
    Line(String),
    Argv(Vec<String>),
}

impl CommandInput {
    /// Caller-facing text of the command, used in logs and error scrubbing.
    pub fn display_text(&self) -> String {
        match self {
            CommandInput::Line(line) => line.clone(),
            CommandInput::Argv(argv) => shell_words::join(argv),
        }
    }
}

impl From<&str> for CommandInput {
    fn from(value: &str) -> Self {
        CommandInput::Line(value.to_string())
    }
}

impl From<String> for CommandInput {
    fn from(value: String) -> Self {
        CommandInput::Line(value)
    }
}

impl From<Vec<String>> for CommandInput {
    fn from(value: Vec<String>) -> Self {
        CommandInput::Argv(value)
    }
}

impl fmt::Display for CommandInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_text())
    }
}

/// Which pipe a chunk of output arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// How a process ended. Exactly one of `code` / `signal` is normally set;
/// both are `None` when the process never started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Symbolic name of the terminating signal, e.g. `"SIGTERM"`.
    pub fn signal_name(&self) -> Option<&'static str> {
        self.signal.and_then(crate::exec::platform::signal_name)
    }
}

/// Platform family the launcher targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformKind {
    Posix,
    Windows,
}

impl PlatformKind {
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformKind::Windows
        } else {
            PlatformKind::Posix
        }
    }
}

/// Log level accepted from config and the `SHELLRUN_LOG` variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!(
                "invalid log level: {other} (expected error, warn, info, debug or trace)"
            )),
        }
    }
}

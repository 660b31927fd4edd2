// src/lib.rs

//! `shellrun`: the command-execution layer behind an agent's shell tools.
//!
//! Two ways to run a command:
//! - [`CommandRunner::run_command`] runs it to completion (or timeout /
//!   cancellation) and returns one [`ExecutionResult`].
//! - [`SessionManager::run_in_background`] starts it as a session whose
//!   output is polled incrementally by id.
//!
//! [`ShellService`] wires both together from a [`ShellConfig`] and renders
//! results as text for the calling agent.

pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod render;
pub mod service;
pub mod sessions;
pub mod types;

pub use config::{ProxyConfig, ShellConfig};
pub use errors::{Result, ShellError};
pub use exec::{CommandRunner, CommandSpec, ExecutionResult, OutputObserver};
pub use service::{BashRequest, ShellService};
pub use sessions::{BackgroundHandle, SessionManager, SessionSnapshot, SessionSummary};
pub use types::{CommandInput, ExitInfo, PlatformKind, StreamKind};

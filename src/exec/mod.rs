// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`env`] builds the child environment (host env, login-shell `PATH`,
//!   proxy, per-call overrides).
//! - [`platform`] hides POSIX/Windows differences behind
//!   [`ProcessPlatform`]: spawning, tree kill, descendant discovery.
//! - [`launcher`] turns a logical command into a spawned shell process.
//! - [`runner`] runs one command to completion and returns an
//!   [`ExecutionResult`].
//! - [`decode`] and `stream` turn raw pipe bytes into clean text chunks.
//!
//! Background sessions (`crate::sessions`) reuse the launcher and the same
//! supervision helpers as the runner.

pub mod decode;
pub mod env;
pub mod launcher;
pub mod platform;
pub mod runner;
mod stream;
pub(crate) mod supervise;

pub use decode::{OutputDecoder, strip_ansi};
pub use env::{EnvironmentResolver, ProxySource, merge_path_lists};
pub use launcher::{
    LaunchRequest, LaunchedShell, PreparedLaunch, ShellLauncher, ShellProcess, SpawnFailure,
    build_invocation, wrap_posix_command,
};
pub use platform::{Invocation, ProcessPlatform, native};
pub use runner::{CommandRunner, CommandSpec, ExecutionResult, OutputCallback, OutputObserver};

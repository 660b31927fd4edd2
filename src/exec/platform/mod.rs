// src/exec/platform/mod.rs

//! Platform capability layer.
//!
//! Everything that differs between POSIX and Windows hosts sits behind
//! [`ProcessPlatform`]: spawning, tree/group kill, and descendant discovery.
//! [`native`] picks the implementation once; the launcher, runner and
//! session manager only ever talk to the trait object.
//!
//! Tests can wrap the native platform (see `shellrun-test-utils`) to
//! observe kill requests without changing production code.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::types::PlatformKind;

#[cfg(unix)]
mod posix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use posix::{PosixPlatform, parse_pgrep_output};
#[cfg(windows)]
pub use windows::WindowsPlatform;

/// Fully resolved program + arguments for one spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// The command line as the interpreter sees it (the wrapper script on
    /// POSIX). Used to scrub spawn errors back to the caller's text.
    pub command_line: String,
}

pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ProcessPlatform: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> PlatformKind;

    /// Start the process with stdin closed and both output pipes captured.
    fn spawn(
        &self,
        invocation: &Invocation,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> std::io::Result<Child>;

    /// Terminate `pid` and everything it started.
    ///
    /// `exited` is flipped by the owner once the direct child has been
    /// reaped; implementations use it to skip needless escalation.
    fn kill_tree(
        &self,
        pid: u32,
        grace: Duration,
        exited: Arc<AtomicBool>,
    ) -> PlatformFuture<'_, ()>;

    /// Read (and delete) the post-exit process snapshot written by the
    /// launcher's wrapper. Returns PIDs other than `main_pid`.
    fn discover_descendants<'a>(
        &'a self,
        aux_file: &'a Path,
        main_pid: Option<u32>,
        aborted: bool,
    ) -> PlatformFuture<'a, Vec<u32>>;
}

/// The platform implementation for the host we were compiled for.
#[cfg(unix)]
pub fn native() -> Arc<dyn ProcessPlatform> {
    Arc::new(PosixPlatform)
}

#[cfg(windows)]
pub fn native() -> Arc<dyn ProcessPlatform> {
    Arc::new(WindowsPlatform)
}

/// Shared `tokio::process::Command` setup for both platforms.
pub(crate) fn base_command(
    invocation: &Invocation,
    cwd: Option<&Path>,
    env: &BTreeMap<String, String>,
) -> Command {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .env_clear()
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

/// Map a signal number to its conventional name.
#[cfg(unix)]
pub fn signal_name(signal: i32) -> Option<&'static str> {
    let name = match signal {
        libc::SIGHUP => "SIGHUP",
        libc::SIGINT => "SIGINT",
        libc::SIGQUIT => "SIGQUIT",
        libc::SIGILL => "SIGILL",
        libc::SIGABRT => "SIGABRT",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGKILL => "SIGKILL",
        libc::SIGUSR1 => "SIGUSR1",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGUSR2 => "SIGUSR2",
        libc::SIGPIPE => "SIGPIPE",
        libc::SIGALRM => "SIGALRM",
        libc::SIGTERM => "SIGTERM",
        _ => return None,
    };
    Some(name)
}

#[cfg(not(unix))]
pub fn signal_name(_signal: i32) -> Option<&'static str> {
    None
}

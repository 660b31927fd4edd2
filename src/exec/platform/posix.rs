// src/exec/platform/posix.rs

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, error, warn};

use super::{Invocation, PlatformFuture, ProcessPlatform, base_command};
use crate::types::PlatformKind;

/// POSIX hosts: every command leads its own process group, so signalling
/// `-pid` reaches the wrapper shell and everything it forked.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosixPlatform;

impl ProcessPlatform for PosixPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Posix
    }

    fn spawn(
        &self,
        invocation: &Invocation,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> io::Result<Child> {
        let mut cmd = base_command(invocation, cwd, env);
        cmd.process_group(0);
        cmd.spawn()
    }

    fn kill_tree(
        &self,
        pid: u32,
        grace: Duration,
        exited: Arc<AtomicBool>,
    ) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            if exited.load(Ordering::SeqCst) {
                return;
            }

            debug!(pid, "sending SIGTERM to process group");
            if let Err(e) = signal_group(pid, libc::SIGTERM) {
                warn!(pid, error = %e, "process group SIGTERM failed; killing direct child");
                kill_direct_child(pid);
                return;
            }

            tokio::time::sleep(grace).await;

            if !exited.load(Ordering::SeqCst) {
                debug!(pid, "process still alive after grace period; sending SIGKILL to group");
                if let Err(e) = signal_group(pid, libc::SIGKILL) {
                    warn!(pid, error = %e, "process group SIGKILL failed; killing direct child");
                    kill_direct_child(pid);
                }
            }
        })
    }

    fn discover_descendants<'a>(
        &'a self,
        aux_file: &'a Path,
        main_pid: Option<u32>,
        aborted: bool,
    ) -> PlatformFuture<'a, Vec<u32>> {
        Box::pin(async move {
            match tokio::fs::read_to_string(aux_file).await {
                Ok(contents) => {
                    let pids = parse_pgrep_output(&contents, main_pid);
                    if let Err(e) = tokio::fs::remove_file(aux_file).await {
                        warn!(path = %aux_file.display(), error = %e, "failed to delete pgrep output");
                    }
                    pids
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if !aborted {
                        error!(path = %aux_file.display(), "missing pgrep output");
                    }
                    Vec::new()
                }
                Err(e) => {
                    warn!(path = %aux_file.display(), error = %e, "failed to read pgrep output");
                    let _ = tokio::fs::remove_file(aux_file).await;
                    Vec::new()
                }
            }
        })
    }
}

/// Parse `pgrep` output (one PID per line) dropping the main child's PID.
/// Lines that are not plain numbers are pgrep diagnostics and get logged.
pub fn parse_pgrep_output(contents: &str, main_pid: Option<u32>) -> Vec<u32> {
    let mut pids = Vec::new();
    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<u32>() {
            Ok(pid) if Some(pid) == main_pid => {}
            Ok(pid) => pids.push(pid),
            Err(_) => error!("pgrep: {}", line),
        }
    }
    pids
}

fn signal_group(pid: u32, signal: libc::c_int) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) with a negative pid only sends a signal.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        // The whole group is already gone.
        return Ok(());
    }
    Err(err)
}

fn kill_direct_child(pid: u32) {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) only sends a signal.
    let rc = unsafe { libc::kill(raw, libc::SIGKILL) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            error!(pid, error = %err, "failed to kill shell process");
        }
    }
}

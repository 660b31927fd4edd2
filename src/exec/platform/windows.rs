// src/exec/platform/windows.rs

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, error};

use super::{Invocation, PlatformFuture, ProcessPlatform, base_command};
use crate::types::PlatformKind;

/// Windows hosts: no process groups to signal, so kills go through
/// `taskkill /t`, and descendant discovery is not available.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsPlatform;

impl ProcessPlatform for WindowsPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Windows
    }

    fn spawn(
        &self,
        invocation: &Invocation,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> io::Result<Child> {
        base_command(invocation, cwd, env).spawn()
    }

    fn kill_tree(
        &self,
        pid: u32,
        _grace: Duration,
        exited: Arc<AtomicBool>,
    ) -> PlatformFuture<'_, ()> {
        Box::pin(async move {
            if exited.load(Ordering::SeqCst) {
                return;
            }
            debug!(pid, "killing process tree with taskkill");
            let status = Command::new("taskkill")
                .args(["/pid", &pid.to_string(), "/f", "/t"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => {}
                Ok(s) => debug!(pid, status = %s, "taskkill reported failure"),
                Err(e) => error!(pid, error = %e, "failed to run taskkill"),
            }
        })
    }

    fn discover_descendants<'a>(
        &'a self,
        _aux_file: &'a Path,
        _main_pid: Option<u32>,
        _aborted: bool,
    ) -> PlatformFuture<'a, Vec<u32>> {
        Box::pin(async { Vec::new() })
    }
}

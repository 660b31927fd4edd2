// src/exec/runner.rs

//! Synchronous command runner: launch, stream, wait, report.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::config::ShellSection;
use crate::errors::Result;
use crate::exec::launcher::{LaunchRequest, ShellLauncher, ShellProcess};
use crate::exec::supervise::{attach_readers, drain_readers, supervise};
use crate::types::{CommandInput, ExitInfo, StreamKind};

/// Per-chunk observer. Called with already decoded, ANSI-free text.
pub type OutputCallback = Box<dyn FnMut(&str) + Send>;

/// One command to run.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub command: CommandInput,
    pub cwd: Option<PathBuf>,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Highest-precedence environment overrides.
    pub env: HashMap<String, String>,
    pub cancel: Option<CancellationToken>,
    pub use_powershell: bool,
    pub executable: Option<String>,
}

impl CommandSpec {
    pub fn new(command: impl Into<CommandInput>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            timeout: None,
            env: HashMap::new(),
            cancel: None,
            use_powershell: false,
            executable: None,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn executable(mut self, program: impl Into<String>) -> Self {
        self.executable = Some(program.into());
        self
    }

    pub fn powershell(mut self, enabled: bool) -> Self {
        self.use_powershell = enabled;
        self
    }

    pub(crate) fn launch_request(&self) -> LaunchRequest {
        LaunchRequest {
            command: self.command.clone(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            use_powershell: self.use_powershell,
            executable: self.executable.clone(),
        }
    }
}

/// Optional live observers for a run.
#[derive(Default)]
pub struct OutputObserver {
    pub on_stdout: Option<OutputCallback>,
    pub on_stderr: Option<OutputCallback>,
}

impl OutputObserver {
    pub fn on_stdout(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stdout = Some(Box::new(f));
        self
    }

    pub fn on_stderr(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_stderr = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// stdout and stderr interleaved in arrival order.
    pub output: String,
    pub stdout: String,
    pub stderr: String,
    /// Spawn or wait failure, already scrubbed of wrapper plumbing.
    pub error: Option<String>,
    pub code: Option<i32>,
    pub signal: Option<i32>,
    /// Processes still in the command's group when the wrapper finished.
    pub background_pids: Vec<u32>,
    pub aux_file_path: PathBuf,
    pub pid: Option<u32>,
    pub timed_out: bool,
    pub aborted: bool,
    pub duration: Duration,
}

impl ExecutionResult {
    fn empty(aux_file_path: PathBuf) -> Self {
        Self {
            output: String::new(),
            stdout: String::new(),
            stderr: String::new(),
            error: None,
            code: None,
            signal: None,
            background_pids: Vec::new(),
            aux_file_path,
            pid: None,
            timed_out: false,
            aborted: false,
            duration: Duration::ZERO,
        }
    }

    pub fn exit(&self) -> ExitInfo {
        ExitInfo {
            code: self.code,
            signal: self.signal,
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none() && self.exit().success()
    }
}

/// Output accumulated by the reader tasks. Once `closed`, late chunks from
/// descendants that still hold the pipes are dropped.
#[derive(Default)]
struct OutputCollector {
    output: String,
    stdout: String,
    stderr: String,
    closed: bool,
}

impl OutputCollector {
    fn push(&mut self, kind: StreamKind, text: &str) -> bool {
        if self.closed {
            return false;
        }
        match kind {
            StreamKind::Stdout => self.stdout.push_str(text),
            StreamKind::Stderr => self.stderr.push_str(text),
        }
        self.output.push_str(text);
        true
    }
}

#[derive(Debug, Clone)]
pub struct CommandRunner {
    launcher: Arc<ShellLauncher>,
    kill_grace: Duration,
    drain_grace: Duration,
}

impl CommandRunner {
    pub fn new(launcher: Arc<ShellLauncher>, shell: &ShellSection) -> Self {
        Self {
            launcher,
            kill_grace: shell.kill_grace(),
            drain_grace: shell.drain_grace(),
        }
    }

    /// Run `spec` to completion.
    ///
    /// Returns `Err` only when the command could not be prepared (bad
    /// working directory, unparsable command). Spawn failures, non-zero
    /// exits, timeouts and cancellation are all reported on the result.
    pub async fn run_command(
        &self,
        spec: CommandSpec,
        observer: OutputObserver,
    ) -> Result<ExecutionResult> {
        let started = Instant::now();
        let original_command = spec.command.display_text();
        let launched = self.launcher.create_shell(&spec.launch_request()).await?;

        let mut result = ExecutionResult::empty(launched.aux_file_path.clone());

        let mut child = match launched.process {
            ShellProcess::Spawned(child) => child,
            ShellProcess::Failed(failure) => {
                warn!(command = %original_command, error = %failure.source, "failed to spawn command");
                result.error = Some(failure.scrubbed_message(&original_command));
                result.duration = started.elapsed();
                return Ok(result);
            }
        };

        let pid = child.id();
        result.pid = pid;

        let collector = Arc::new(Mutex::new(OutputCollector::default()));
        let OutputObserver {
            on_stdout,
            on_stderr,
        } = observer;
        let readers = attach_readers(
            &mut child,
            self.launcher.platform().kind(),
            chunk_sink(Arc::clone(&collector), on_stdout),
            chunk_sink(Arc::clone(&collector), on_stderr),
        );

        let cancel = spec.cancel.clone().unwrap_or_default();
        let exited = Arc::new(AtomicBool::new(false));
        let supervision = supervise(
            &mut child,
            &cancel,
            spec.timeout,
            self.launcher.platform(),
            self.kill_grace,
            &exited,
        )
        .await;

        match supervision.status {
            Ok(status) => {
                let exit = ExitInfo::from_status(status);
                result.code = exit.code;
                result.signal = exit.signal;
            }
            Err(e) => {
                warn!(pid, error = %e, "failed to wait for command");
                result.error = Some(format!("failed to wait for `{original_command}`: {e}"));
            }
        }
        result.aborted = supervision.aborted;
        result.timed_out = supervision.timed_out;

        drain_readers(readers, self.drain_grace).await;
        {
            let mut collected = collector.lock().unwrap_or_else(PoisonError::into_inner);
            collected.closed = true;
            result.output = std::mem::take(&mut collected.output);
            result.stdout = std::mem::take(&mut collected.stdout);
            result.stderr = std::mem::take(&mut collected.stderr);
        }

        result.background_pids = self
            .launcher
            .platform()
            .discover_descendants(
                &result.aux_file_path,
                pid,
                result.aborted || result.timed_out,
            )
            .await;
        result.duration = started.elapsed();

        info!(
            pid,
            code = result.code,
            signal = result.signal,
            timed_out = result.timed_out,
            aborted = result.aborted,
            background = result.background_pids.len(),
            duration_ms = result.duration.as_millis() as u64,
            "command finished"
        );

        Ok(result)
    }
}

fn chunk_sink(
    collector: Arc<Mutex<OutputCollector>>,
    mut callback: Option<OutputCallback>,
) -> impl FnMut(StreamKind, String) + Send + 'static {
    move |kind, text| {
        let accepted = collector
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(kind, &text);
        if !accepted {
            return;
        }
        trace!(stream = ?kind, "{}", text);
        if let Some(cb) = callback.as_mut() {
            cb(&text);
        }
    }
}

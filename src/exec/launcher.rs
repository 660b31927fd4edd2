// src/exec/launcher.rs

//! Shell launcher: logical command -> platform-correct spawn.
//!
//! On POSIX the user command is wrapped so that, whatever its outcome, the
//! wrapper snapshots its own process group into a private temp file and
//! then exits with the *user command's* status:
//!
//! ```text
//! { <command>
//! }; __code=$?; pgrep -g 0 >/tmp/shell_pgrep_<hex>.tmp 2>&1; exit $__code;
//! ```
//!
//! The newline before `}` keeps trailing comments, `;` and `&` in the user
//! command from breaking the group syntax.
//!
//! On Windows the command goes to `cmd.exe /c` (or PowerShell) with
//! shell-word tokenization, and no snapshot is taken.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::process::Child;
use tracing::{debug, info};

use crate::config::ShellSection;
use crate::errors::{Result, ShellError};
use crate::exec::env::EnvironmentResolver;
use crate::exec::platform::{Invocation, ProcessPlatform};
use crate::types::{CommandInput, PlatformKind};

/// What to launch and how.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub command: CommandInput,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub use_powershell: bool,
    /// Replaces the interpreter (`bash`, `cmd.exe`).
    pub executable: Option<String>,
}

impl LaunchRequest {
    pub fn new(command: impl Into<CommandInput>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: HashMap::new(),
            use_powershell: false,
            executable: None,
        }
    }
}

/// The OS refused to start the process.
#[derive(Debug)]
pub struct SpawnFailure {
    pub command_line: String,
    pub source: io::Error,
}

impl fmt::Display for SpawnFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn {} failed: {}", self.command_line, self.source)
    }
}

impl SpawnFailure {
    /// Error text with the internal wrapper replaced by the caller's own
    /// command, so users never see the `pgrep` plumbing.
    pub fn scrubbed_message(&self, original_command: &str) -> String {
        self.to_string()
            .replace(&self.command_line, original_command)
    }
}

/// Spawn outcome. A failure here is data, not an `Err`: it is reported
/// on the execution result or the session, like any other failed command.
#[derive(Debug)]
pub enum ShellProcess {
    Spawned(Child),
    Failed(SpawnFailure),
}

#[derive(Debug)]
pub struct LaunchedShell {
    pub process: ShellProcess,
    /// Where the POSIX wrapper writes its process-group snapshot.
    pub aux_file_path: PathBuf,
    pub command_line: String,
}

/// A validated request, ready for [`ShellLauncher::launch`].
#[derive(Debug)]
pub struct PreparedLaunch {
    command: String,
    invocation: Invocation,
    cwd: Option<PathBuf>,
    env: HashMap<String, String>,
    aux_file_path: PathBuf,
}

#[derive(Debug)]
pub struct ShellLauncher {
    shell: ShellSection,
    resolver: Arc<EnvironmentResolver>,
    platform: Arc<dyn ProcessPlatform>,
}

impl ShellLauncher {
    pub fn new(
        shell: ShellSection,
        resolver: Arc<EnvironmentResolver>,
        platform: Arc<dyn ProcessPlatform>,
    ) -> Self {
        Self {
            shell,
            resolver,
            platform,
        }
    }

    pub fn platform(&self) -> &Arc<dyn ProcessPlatform> {
        &self.platform
    }

    pub fn shell_section(&self) -> &ShellSection {
        &self.shell
    }

    /// Build the invocation and start it.
    ///
    /// Returns `Err` only for problems detected before spawning (bad
    /// working directory, unparsable command).
    pub async fn create_shell(&self, request: &LaunchRequest) -> Result<LaunchedShell> {
        let prepared = self.prepare(request)?;
        Ok(self.launch(prepared).await)
    }

    /// Validate `request` and build its invocation without touching the
    /// environment or spawning anything.
    pub fn prepare(&self, request: &LaunchRequest) -> Result<PreparedLaunch> {
        if let Some(dir) = &request.cwd {
            validate_directory(dir)?;
        }

        let aux_file_path = new_aux_file_path();
        let invocation =
            build_invocation(self.platform.kind(), &self.shell, request, &aux_file_path)?;

        Ok(PreparedLaunch {
            command: request.command.display_text(),
            invocation,
            cwd: request.cwd.clone(),
            env: request.env.clone(),
            aux_file_path,
        })
    }

    /// Resolve the child environment and spawn a prepared invocation.
    pub async fn launch(&self, prepared: PreparedLaunch) -> LaunchedShell {
        let PreparedLaunch {
            command,
            invocation,
            cwd,
            env,
            aux_file_path,
        } = prepared;
        let env = self.resolver.resolve(&env).await;

        info!(
            command = %command,
            program = %invocation.program,
            cwd = ?cwd,
            "starting shell process"
        );
        debug!(command_line = %invocation.command_line, "resolved shell command line");

        let process = match self.platform.spawn(&invocation, cwd.as_deref(), &env) {
            Ok(child) => ShellProcess::Spawned(child),
            Err(source) => ShellProcess::Failed(SpawnFailure {
                command_line: invocation.command_line.clone(),
                source,
            }),
        };

        LaunchedShell {
            process,
            aux_file_path,
            command_line: invocation.command_line,
        }
    }
}

/// Pure translation of a request into program + args for `kind`.
pub fn build_invocation(
    kind: PlatformKind,
    shell: &ShellSection,
    request: &LaunchRequest,
    aux_file: &Path,
) -> Result<Invocation> {
    match kind {
        PlatformKind::Posix => build_posix_invocation(shell, request, aux_file),
        PlatformKind::Windows => build_windows_invocation(shell, request),
    }
}

fn build_posix_invocation(
    shell: &ShellSection,
    request: &LaunchRequest,
    aux_file: &Path,
) -> Result<Invocation> {
    let user_command = request.command.display_text();
    if user_command.trim().is_empty() {
        return Err(ShellError::CommandParse {
            command: user_command,
            reason: "command is empty".to_string(),
        });
    }

    let wrapped = wrap_posix_command(&user_command, aux_file);
    let program = request
        .executable
        .clone()
        .unwrap_or_else(|| shell.posix_shell.clone());

    Ok(Invocation {
        program,
        args: vec!["-c".to_string(), wrapped.clone()],
        command_line: wrapped,
    })
}

/// Wrap `command` so its exit status survives the process-group snapshot.
pub fn wrap_posix_command(command: &str, aux_file: &Path) -> String {
    let aux = aux_file.to_string_lossy();
    format!(
        "{{ {command}\n}}; __code=$?; pgrep -g 0 >{} 2>&1; exit $__code;",
        shell_words::quote(&aux)
    )
}

fn build_windows_invocation(shell: &ShellSection, request: &LaunchRequest) -> Result<Invocation> {
    let tokens = match &request.command {
        CommandInput::Line(line) => {
            shell_words::split(line).map_err(|e| ShellError::CommandParse {
                command: line.clone(),
                reason: e.to_string(),
            })?
        }
        CommandInput::Argv(argv) => argv.clone(),
    };
    if tokens.is_empty() {
        return Err(ShellError::CommandParse {
            command: request.command.display_text(),
            reason: "command is empty".to_string(),
        });
    }

    let (program, args) = if request.use_powershell {
        (shell.powershell.clone(), tokens)
    } else if let Some(exe) = &request.executable {
        (exe.clone(), tokens)
    } else {
        let mut args = Vec::with_capacity(tokens.len() + 1);
        args.push("/c".to_string());
        args.extend(tokens);
        (shell.windows_shell.clone(), args)
    };

    Ok(Invocation {
        program,
        args,
        command_line: request.command.display_text(),
    })
}

fn validate_directory(dir: &Path) -> Result<()> {
    match std::fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ShellError::NotADirectory(dir.to_path_buf())),
        Err(_) => Err(ShellError::DirectoryNotFound(dir.to_path_buf())),
    }
}

/// Random, not-yet-existing path under the OS temp directory.
fn new_aux_file_path() -> PathBuf {
    let bytes: [u8; 6] = rand::random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    std::env::temp_dir().join(format!("shell_pgrep_{hex}.tmp"))
}

// src/service.rs

//! `ShellService`: the long-lived owner of the whole execution stack, and
//! the entry point tool handlers call into.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ProxyConfig, ShellConfig};
use crate::errors::Result;
use crate::exec::env::{EnvironmentResolver, ProxySource};
use crate::exec::launcher::ShellLauncher;
use crate::exec::platform::{self, ProcessPlatform};
use crate::exec::runner::{CommandRunner, CommandSpec, OutputObserver};
use crate::render;
use crate::sessions::SessionManager;

/// Input of the `Bash` tool.
#[derive(Debug, Clone, Deserialize)]
pub struct BashRequest {
    pub command: String,
    /// Free-form description of the command; only logged.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    /// Milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub run_in_background: bool,
}

impl BashRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            description: None,
            directory: None,
            timeout: None,
            run_in_background: false,
        }
    }
}

pub struct ShellService {
    config: ShellConfig,
    proxy: Arc<RwLock<Option<ProxyConfig>>>,
    runner: CommandRunner,
    sessions: SessionManager,
}

impl ShellService {
    pub fn new(config: ShellConfig) -> Self {
        Self::with_platform(config, platform::native())
    }

    /// Build the service on a specific platform implementation.
    pub fn with_platform(config: ShellConfig, platform: Arc<dyn ProcessPlatform>) -> Self {
        let proxy = Arc::new(RwLock::new(config.proxy.clone()));
        let proxy_source: Arc<dyn ProxySource> = proxy.clone();
        let resolver = Arc::new(EnvironmentResolver::new(&config.env, proxy_source));
        let launcher = Arc::new(ShellLauncher::new(
            config.shell.clone(),
            resolver,
            platform,
        ));
        let runner = CommandRunner::new(Arc::clone(&launcher), &config.shell);
        let sessions = SessionManager::new(launcher, &config.shell);

        Self {
            config,
            proxy,
            runner,
            sessions,
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Replace the proxy injected into children spawned from now on.
    pub fn set_proxy(&self, proxy: Option<ProxyConfig>) {
        let mut guard = match self.proxy.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = proxy;
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Handle one `Bash` tool call and render the outcome as text.
    ///
    /// Foreground runs get the configured default timeout, capped at the
    /// configured maximum. Background runs are only bounded when the caller
    /// asked for a timeout.
    pub async fn bash(
        &self,
        request: BashRequest,
        cancel: Option<CancellationToken>,
        thread_id: Option<&str>,
    ) -> Result<String> {
        let shell = &self.config.shell;
        debug!(command = %request.command, description = ?request.description, "bash tool call");

        let mut spec = CommandSpec::new(request.command.as_str());
        spec.cwd = request.directory.clone();
        spec.cancel = cancel;

        if request.run_in_background {
            spec.timeout = request.timeout.map(|ms| shell.effective_timeout(Some(ms)));
            let handle =
                self.sessions
                    .run_in_background(spec, None, thread_id.map(str::to_string))?;
            info!(session = %handle.id(), "bash command moved to background");
            return Ok(render::background_started(handle.id()));
        }

        spec.timeout = Some(shell.effective_timeout(request.timeout));
        let result = self.runner.run_command(spec, OutputObserver::default()).await?;

        if result.aborted {
            return Ok(render::render_cancelled(&result, shell.max_output_chars));
        }
        Ok(render::render_execution(
            &result,
            &request.command,
            request.directory.as_deref(),
            shell.max_output_chars,
        ))
    }

    /// Handle a `BashOutput` call: new output since the previous poll.
    pub fn bash_output(&self, id: &str) -> String {
        match self.sessions.get_session(id) {
            Some(snapshot) => {
                render::render_session_output(&snapshot, self.config.shell.max_output_chars)
            }
            None => render::session_not_found(id),
        }
    }

    /// Handle a `KillBash` call: stop the session and drop it.
    pub async fn kill_bash(&self, id: &str) -> String {
        match self.sessions.remove(id).await {
            Some(snapshot) => format!(
                "Killed background bash {id}\n{}",
                render::render_session_output(&snapshot, self.config.shell.max_output_chars)
            ),
            None => render::session_not_found(id),
        }
    }

    /// Reminders for `thread_id`'s sessions that have unread output or an
    /// unreported exit.
    pub fn pending_reminders(&self, thread_id: &str) -> Vec<String> {
        self.sessions
            .sessions(Some(thread_id))
            .iter()
            .filter(|summary| summary.has_update)
            .map(render::update_reminder)
            .collect()
    }
}

impl std::fmt::Debug for ShellService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellService")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .finish()
    }
}

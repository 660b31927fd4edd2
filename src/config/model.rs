// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::LogLevel;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// log_level = "debug"
///
/// [shell]
/// posix_shell = "bash"
/// default_timeout_ms = 120000
/// kill_grace_ms = 200
///
/// [env]
/// fix_path = true
/// login_shell_timeout_ms = 3000
/// extra = { LANG = "C.UTF-8" }
///
/// [proxy]
/// host = "127.0.0.1"
/// port = 7890
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawShellConfig {
    #[serde(default)]
    pub log_level: Option<LogLevel>,

    #[serde(default)]
    pub shell: ShellSection,

    #[serde(default)]
    pub env: EnvSection,

    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

/// `[shell]` section: interpreters, timeouts and output limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ShellSection {
    /// Interpreter used on POSIX hosts; invoked as `<shell> -c <wrapper>`.
    #[serde(default = "default_posix_shell")]
    pub posix_shell: String,

    /// Command interpreter used on Windows; invoked as `<shell> /c ...`.
    #[serde(default = "default_windows_shell")]
    pub windows_shell: String,

    /// PowerShell host used on Windows when a caller asks for it.
    #[serde(default = "default_powershell")]
    pub powershell: String,

    /// Timeout applied when a tool request does not carry one.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    /// Upper bound for caller-supplied timeouts.
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,

    /// Time between SIGTERM and SIGKILL when escalating a kill.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// How long to keep reading pipes after the main process exited before
    /// the result is finalised. Descendants holding the pipe open do not
    /// delay the result past this.
    #[serde(default = "default_drain_grace_ms")]
    pub drain_grace_ms: u64,

    /// Character budget for text rendered back to the agent.
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
}

fn default_posix_shell() -> String {
    "bash".to_string()
}

fn default_windows_shell() -> String {
    "cmd.exe".to_string()
}

fn default_powershell() -> String {
    "powershell.exe".to_string()
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_max_timeout_ms() -> u64 {
    600_000
}

fn default_kill_grace_ms() -> u64 {
    200
}

fn default_drain_grace_ms() -> u64 {
    100
}

fn default_max_output_chars() -> usize {
    30_000
}

impl Default for ShellSection {
    fn default() -> Self {
        Self {
            posix_shell: default_posix_shell(),
            windows_shell: default_windows_shell(),
            powershell: default_powershell(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            kill_grace_ms: default_kill_grace_ms(),
            drain_grace_ms: default_drain_grace_ms(),
            max_output_chars: default_max_output_chars(),
        }
    }
}

impl ShellSection {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn max_timeout(&self) -> Duration {
        Duration::from_millis(self.max_timeout_ms)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }

    /// Clamp a caller-supplied timeout; `None` means "use the default".
    pub fn effective_timeout(&self, requested_ms: Option<u64>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.default_timeout_ms)
            .min(self.max_timeout_ms);
        Duration::from_millis(ms)
    }
}

/// `[env]` section: how the child environment is assembled.
#[derive(Debug, Clone, Deserialize)]
pub struct EnvSection {
    /// Merge the login shell's `PATH` into the child's `PATH`. Processes
    /// launched from a desktop session often miss entries added by shell
    /// profiles.
    #[serde(default = "default_fix_path")]
    pub fix_path: bool,

    /// Shell asked for the login `PATH`. Falls back to `$SHELL`.
    #[serde(default)]
    pub login_shell: Option<String>,

    /// Upper bound on the login shell query. A profile that hangs past
    /// this leaves `PATH` as inherited.
    #[serde(default = "default_login_shell_timeout_ms")]
    pub login_shell_timeout_ms: u64,

    /// Variables injected into every child, below per-call overrides.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

fn default_fix_path() -> bool {
    true
}

fn default_login_shell_timeout_ms() -> u64 {
    3_000
}

impl EnvSection {
    pub fn login_shell_timeout(&self) -> Duration {
        Duration::from_millis(self.login_shell_timeout_ms)
    }
}

impl Default for EnvSection {
    fn default() -> Self {
        Self {
            fix_path: default_fix_path(),
            login_shell: None,
            login_shell_timeout_ms: default_login_shell_timeout_ms(),
            extra: BTreeMap::new(),
        }
    }
}

/// `[proxy]` section. When present, children get `HTTP_PROXY` and
/// `HTTPS_PROXY` pointing at `http://host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Validated configuration. Only constructible through
/// `ShellConfig::try_from(RawShellConfig)` (or `Default`).
#[derive(Debug, Clone, Default)]
pub struct ShellConfig {
    pub log_level: Option<LogLevel>,
    pub shell: ShellSection,
    pub env: EnvSection,
    pub proxy: Option<ProxyConfig>,
}

impl ShellConfig {
    pub(crate) fn new_unchecked(raw: RawShellConfig) -> Self {
        Self {
            log_level: raw.log_level,
            shell: raw.shell,
            env: raw.env,
            proxy: raw.proxy,
        }
    }
}

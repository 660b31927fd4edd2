#![allow(dead_code)]

use std::sync::Arc;

use shellrun::config::{ProxyConfig, RawShellConfig, ShellConfig};
use shellrun::exec::ProcessPlatform;
use shellrun::ShellService;

/// Builder for `ShellConfig` to simplify test setup.
///
/// Starts from defaults with the login-shell `PATH` lookup turned off, so
/// tests do not depend on the developer's shell profile.
pub struct ShellConfigBuilder {
    config: RawShellConfig,
}

impl ShellConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawShellConfig::default();
        config.env.fix_path = false;
        Self { config }
    }

    pub fn default_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shell.default_timeout_ms = ms;
        self
    }

    pub fn max_timeout_ms(mut self, ms: u64) -> Self {
        self.config.shell.max_timeout_ms = ms;
        self
    }

    pub fn kill_grace_ms(mut self, ms: u64) -> Self {
        self.config.shell.kill_grace_ms = ms;
        self
    }

    pub fn max_output_chars(mut self, chars: usize) -> Self {
        self.config.shell.max_output_chars = chars;
        self
    }

    pub fn posix_shell(mut self, shell: &str) -> Self {
        self.config.shell.posix_shell = shell.to_string();
        self
    }

    pub fn fix_path(mut self, on: bool) -> Self {
        self.config.env.fix_path = on;
        self
    }

    pub fn login_shell(mut self, shell: &str) -> Self {
        self.config.env.login_shell = Some(shell.to_string());
        self
    }

    pub fn login_shell_timeout_ms(mut self, ms: u64) -> Self {
        self.config.env.login_shell_timeout_ms = ms;
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.config.env.extra.insert(key.to_string(), value.to_string());
        self
    }

    pub fn proxy(mut self, host: &str, port: u16) -> Self {
        self.config.proxy = Some(ProxyConfig {
            host: host.to_string(),
            port,
        });
        self
    }

    pub fn build(self) -> ShellConfig {
        ShellConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn service(self) -> ShellService {
        ShellService::new(self.build())
    }

    pub fn service_on(self, platform: Arc<dyn ProcessPlatform>) -> ShellService {
        ShellService::with_platform(self.build(), platform)
    }
}

impl Default for ShellConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

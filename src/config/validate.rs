// src/config/validate.rs

use crate::config::model::{RawShellConfig, ShellConfig};
use crate::errors::{Result, ShellError};

impl TryFrom<RawShellConfig> for ShellConfig {
    type Error = crate::errors::ShellError;

    fn try_from(raw: RawShellConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ShellConfig::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawShellConfig) -> Result<()> {
    validate_shell_names(cfg)?;
    validate_timeouts(cfg)?;
    validate_proxy(cfg)?;
    Ok(())
}

fn validate_shell_names(cfg: &RawShellConfig) -> Result<()> {
    let names = [
        ("posix_shell", &cfg.shell.posix_shell),
        ("windows_shell", &cfg.shell.windows_shell),
        ("powershell", &cfg.shell.powershell),
    ];
    for (key, value) in names {
        if value.trim().is_empty() {
            return Err(ShellError::ConfigError(format!(
                "[shell].{key} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_timeouts(cfg: &RawShellConfig) -> Result<()> {
    let shell = &cfg.shell;

    if shell.default_timeout_ms == 0 {
        return Err(ShellError::ConfigError(
            "[shell].default_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if shell.max_timeout_ms == 0 {
        return Err(ShellError::ConfigError(
            "[shell].max_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if shell.default_timeout_ms > shell.max_timeout_ms {
        return Err(ShellError::ConfigError(format!(
            "[shell].default_timeout_ms ({}) exceeds max_timeout_ms ({})",
            shell.default_timeout_ms, shell.max_timeout_ms
        )));
    }
    if cfg.env.login_shell_timeout_ms == 0 {
        return Err(ShellError::ConfigError(
            "[env].login_shell_timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if shell.max_output_chars < 200 {
        return Err(ShellError::ConfigError(format!(
            "[shell].max_output_chars must be >= 200 (got {})",
            shell.max_output_chars
        )));
    }
    Ok(())
}

fn validate_proxy(cfg: &RawShellConfig) -> Result<()> {
    if let Some(proxy) = &cfg.proxy {
        if proxy.host.trim().is_empty() {
            return Err(ShellError::ConfigError(
                "[proxy].host must not be empty".to_string(),
            ));
        }
        if proxy.port == 0 {
            return Err(ShellError::ConfigError(
                "[proxy].port must be non-zero".to_string(),
            ));
        }
    }
    Ok(())
}

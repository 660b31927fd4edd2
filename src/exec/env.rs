// src/exec/env.rs

//! Child environment assembly.
//!
//! Layering, lowest priority first:
//! 1. the host process environment
//! 2. `PATH` merged with the login shell's `PATH` (when `fix_path` is on)
//! 3. `HOME` pinned to the user's home directory
//! 4. `HTTP_PROXY` / `HTTPS_PROXY` from the current proxy setting
//! 5. `[env].extra` from config
//! 6. per-call overrides

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Debug;
use std::process::Stdio;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::config::{EnvSection, ProxyConfig};

const PATH_DELIMITER: &str = "_SHELLRUN_PATH_DELIMITER_";

/// Process-wide settings collaborator that knows the current proxy.
///
/// The proxy can change while the service is running, so the resolver asks
/// on every spawn instead of copying the value once.
pub trait ProxySource: Send + Sync + Debug {
    fn proxy(&self) -> Option<ProxyConfig>;
}

impl ProxySource for RwLock<Option<ProxyConfig>> {
    fn proxy(&self) -> Option<ProxyConfig> {
        match self.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProxySource for Option<ProxyConfig> {
    fn proxy(&self) -> Option<ProxyConfig> {
        self.clone()
    }
}

#[derive(Debug)]
pub struct EnvironmentResolver {
    fix_path: bool,
    login_shell: Option<String>,
    login_shell_timeout: Duration,
    extra: BTreeMap<String, String>,
    proxy: Arc<dyn ProxySource>,
    login_path: OnceCell<Option<String>>,
}

impl EnvironmentResolver {
    pub fn new(section: &EnvSection, proxy: Arc<dyn ProxySource>) -> Self {
        Self {
            fix_path: section.fix_path && cfg!(unix),
            login_shell: section.login_shell.clone(),
            login_shell_timeout: section.login_shell_timeout(),
            extra: section.extra.clone(),
            proxy,
            login_path: OnceCell::new(),
        }
    }

    /// Build the full environment for one child process.
    ///
    /// The first call with `fix_path` on queries the login shell; that
    /// query is bounded by `login_shell_timeout` and its result (or its
    /// absence) is cached for the resolver's lifetime.
    pub async fn resolve(&self, overrides: &HashMap<String, String>) -> BTreeMap<String, String> {
        let mut env: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();

        if self.fix_path {
            if let Some(login_path) = self.login_path().await {
                let merged = merge_path_lists(login_path, env.get("PATH").map(String::as_str));
                env.insert("PATH".to_string(), merged);
            }
        }

        if let Some(home) = dirs::home_dir() {
            env.insert("HOME".to_string(), home.to_string_lossy().into_owned());
        }

        if let Some(proxy) = self.proxy.proxy() {
            let url = proxy.url();
            env.insert("HTTP_PROXY".to_string(), url.clone());
            env.insert("HTTPS_PROXY".to_string(), url);
        }

        for (key, value) in &self.extra {
            env.insert(key.clone(), value.clone());
        }

        for (key, value) in overrides {
            env.insert(key.clone(), value.clone());
        }

        env
    }

    async fn login_path(&self) -> Option<&str> {
        self.login_path
            .get_or_init(|| async {
                match self.login_shell_program() {
                    Some(shell) => read_login_shell_path(&shell, self.login_shell_timeout).await,
                    None => None,
                }
            })
            .await
            .as_deref()
    }

    fn login_shell_program(&self) -> Option<String> {
        self.login_shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Ask `shell` for its login `PATH`.
///
/// Profiles may print noise, so the value is fenced by delimiters. A shell
/// still running at `limit` is killed and the lookup yields `None`.
async fn read_login_shell_path(shell: &str, limit: Duration) -> Option<String> {
    let script = format!("printf '%s%s%s' '{PATH_DELIMITER}' \"$PATH\" '{PATH_DELIMITER}'; exit");

    let query = Command::new(shell)
        .arg("-ilc")
        .arg(&script)
        .env("DISABLE_AUTO_UPDATE", "true")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(limit, query).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            warn!(shell = %shell, error = %e, "could not query login shell PATH");
            return None;
        }
        Err(_) => {
            warn!(shell = %shell, timeout = ?limit, "login shell PATH query timed out");
            return None;
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    let path = text.split(PATH_DELIMITER).nth(1)?.trim().to_string();
    if path.is_empty() {
        return None;
    }
    debug!(shell = %shell, path = %path, "resolved login shell PATH");
    Some(path)
}

/// Login entries first, then any entries only present in the current
/// `PATH`. Duplicates and empty segments are dropped.
pub fn merge_path_lists(login: &str, current: Option<&str>) -> String {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for entry in login.split(':').chain(current.unwrap_or("").split(':')) {
        if entry.is_empty() {
            continue;
        }
        if seen.insert(entry) {
            merged.push(entry);
        }
    }

    merged.join(":")
}

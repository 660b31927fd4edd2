// src/sessions/manager.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ShellSection;
use crate::errors::{Result, ShellError};
use crate::exec::launcher::{PreparedLaunch, ShellLauncher, ShellProcess};
use crate::exec::runner::CommandSpec;
use crate::exec::supervise::{attach_readers, drain_readers, supervise};
use crate::sessions::session::{SessionSnapshot, SessionState, SessionSummary};
use crate::types::{ExitInfo, StreamKind};

type SharedState = Arc<Mutex<SessionState>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct SessionEntry {
    state: SharedState,
    cancel: CancellationToken,
    /// Flips to `true` once the session is final (exit recorded, or spawn
    /// failed).
    exited: watch::Receiver<bool>,
}

/// Returned by [`SessionManager::run_in_background`]. The id is usable for
/// polling right away; [`BackgroundHandle::wait`] resolves on exit.
#[derive(Debug)]
pub struct BackgroundHandle {
    id: String,
    state: SharedState,
    exited: watch::Receiver<bool>,
}

impl BackgroundHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn wait(mut self) -> ExitInfo {
        let _ = self.exited.wait_for(|done| *done).await;
        lock(&self.state).exit()
    }
}

/// Registry of background sessions.
///
/// The registry lock only guards the id -> session map and is never held
/// across an await. Each session's output buffers have their own lock,
/// shared with that session's reader tasks.
pub struct SessionManager {
    launcher: Arc<ShellLauncher>,
    kill_grace: Duration,
    drain_grace: Duration,
    sessions: Mutex<HashMap<String, Arc<SessionEntry>>>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("sessions", &lock(&self.sessions).len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(launcher: Arc<ShellLauncher>, shell: &ShellSection) -> Self {
        Self {
            launcher,
            kill_grace: shell.kill_grace(),
            drain_grace: shell.drain_grace(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Start `spec` as a background session.
    ///
    /// Must be called from within a Tokio runtime. The command is
    /// validated here; environment resolution and the spawn itself happen
    /// on the session's monitor task, so the id is returned without
    /// waiting on either. A spawn failure still creates the session; its
    /// error shows up once the session is final.
    pub fn run_in_background(
        &self,
        spec: CommandSpec,
        session_id: Option<String>,
        thread_id: Option<String>,
    ) -> Result<BackgroundHandle> {
        let id = session_id.unwrap_or_else(generate_session_id);
        let original_command = spec.command.display_text();

        if lock(&self.sessions).contains_key(&id) {
            return Err(ShellError::SessionExists(id));
        }
        let prepared = self.launcher.prepare(&spec.launch_request())?;

        let state = Arc::new(Mutex::new(SessionState::new(
            id.clone(),
            original_command.clone(),
            spec.cwd.clone(),
            thread_id,
        )));
        let cancel = spec
            .cancel
            .as_ref()
            .map(CancellationToken::child_token)
            .unwrap_or_default();
        let (exit_tx, exit_rx) = watch::channel(false);

        {
            let mut sessions = lock(&self.sessions);
            if sessions.contains_key(&id) {
                return Err(ShellError::SessionExists(id));
            }
            sessions.insert(
                id.clone(),
                Arc::new(SessionEntry {
                    state: Arc::clone(&state),
                    cancel: cancel.clone(),
                    exited: exit_rx.clone(),
                }),
            );
        }

        let monitor = SessionMonitor {
            id: id.clone(),
            command: original_command,
            launcher: Arc::clone(&self.launcher),
            state: Arc::clone(&state),
            cancel,
            timeout: spec.timeout,
            kill_grace: self.kill_grace,
            drain_grace: self.drain_grace,
            exit_tx,
        };
        tokio::spawn(monitor.run(prepared));

        Ok(BackgroundHandle {
            id,
            state,
            exited: exit_rx,
        })
    }

    /// Poll a session: returns output produced since the previous poll.
    ///
    /// A session that has exited is dropped from the registry by this
    /// call, so its final output is delivered exactly once.
    pub fn get_session(&self, id: &str) -> Option<SessionSnapshot> {
        let mut sessions = lock(&self.sessions);
        let Some(entry) = sessions.get(id) else {
            warn!(session = %id, "background session not found");
            return None;
        };

        let snapshot = lock(&entry.state).take_unread();
        if snapshot.summary.is_exited {
            sessions.remove(id);
            debug!(session = %id, "exited session delivered and removed");
        }
        Some(snapshot)
    }

    pub fn has_update(&self, id: &str) -> bool {
        self.entry(id)
            .map(|entry| lock(&entry.state).has_update())
            .unwrap_or(false)
    }

    /// Request termination. Returns `false` for unknown ids.
    pub fn kill(&self, id: &str) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        if !lock(&entry.state).is_exited() {
            info!(session = %id, "killing background session");
            entry.cancel.cancel();
        }
        true
    }

    /// Kill (if needed), wait for the process to be gone, unregister, and
    /// return whatever output had not been delivered yet.
    pub async fn remove(&self, id: &str) -> Option<SessionSnapshot> {
        let Some(entry) = self.entry(id) else {
            debug!(session = %id, "remove: session not found");
            return None;
        };

        if !lock(&entry.state).is_exited() {
            entry.cancel.cancel();
        }
        let mut exited = entry.exited.clone();
        let _ = exited.wait_for(|done| *done).await;

        let snapshot = lock(&entry.state).take_unread();
        self.unregister(id, &entry);
        info!(session = %id, "background session removed");
        Some(snapshot)
    }

    /// All sessions, oldest first, optionally restricted to one thread.
    pub fn sessions(&self, thread_id: Option<&str>) -> Vec<SessionSummary> {
        let entries: Vec<Arc<SessionEntry>> = lock(&self.sessions).values().cloned().collect();
        let mut summaries: Vec<SessionSummary> = entries
            .iter()
            .filter_map(|entry| {
                let state = lock(&entry.state);
                match thread_id {
                    Some(wanted) if state.thread_id() != Some(wanted) => None,
                    _ => Some(state.summary()),
                }
            })
            .collect();
        summaries.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Keep only the ids that are still registered.
    pub fn remove_not_existed(&self, ids: &[String]) -> Vec<String> {
        let sessions = lock(&self.sessions);
        ids.iter()
            .filter(|id| sessions.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    fn entry(&self, id: &str) -> Option<Arc<SessionEntry>> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Drop `id` only while it still maps to `entry`; the id may have been
    /// released and reused while the caller was awaiting.
    fn unregister(&self, id: &str, entry: &Arc<SessionEntry>) {
        let mut sessions = lock(&self.sessions);
        if sessions
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            sessions.remove(id);
        } else if sessions.contains_key(id) {
            debug!(session = %id, "id now belongs to a newer session; left registered");
        }
    }
}

/// Launches one session's child process and owns it until it exits.
struct SessionMonitor {
    id: String,
    command: String,
    launcher: Arc<ShellLauncher>,
    state: SharedState,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    kill_grace: Duration,
    drain_grace: Duration,
    exit_tx: watch::Sender<bool>,
}

impl SessionMonitor {
    async fn run(self, prepared: PreparedLaunch) {
        let launched = self.launcher.launch(prepared).await;
        match launched.process {
            ShellProcess::Spawned(child) => {
                lock(&self.state).set_pid(child.id());
                info!(session = %self.id, pid = child.id(), command = %self.command, "background session started");
                self.watch_child(child, launched.aux_file_path).await;
            }
            ShellProcess::Failed(failure) => {
                warn!(session = %self.id, error = %failure.source, "background session failed to spawn");
                lock(&self.state).record_spawn_error(failure.scrubbed_message(&self.command));
                self.exit_tx.send_replace(true);
            }
        }
    }

    async fn watch_child(self, mut child: Child, aux_file_path: PathBuf) {
        let pid = child.id();
        let platform = self.launcher.platform();

        let readers = attach_readers(
            &mut child,
            platform.kind(),
            append_to(Arc::clone(&self.state)),
            append_to(Arc::clone(&self.state)),
        );

        let exited = Arc::new(AtomicBool::new(false));
        let supervision = supervise(
            &mut child,
            &self.cancel,
            self.timeout,
            platform,
            self.kill_grace,
            &exited,
        )
        .await;

        let exit = match supervision.status {
            Ok(status) => ExitInfo::from_status(status),
            Err(e) => {
                warn!(session = %self.id, error = %e, "failed to wait for background session");
                lock(&self.state).record_wait_error(format!("failed to wait for process: {e}"));
                ExitInfo::default()
            }
        };

        drain_readers(readers, self.drain_grace).await;

        let background_pids = platform
            .discover_descendants(
                &aux_file_path,
                pid,
                supervision.aborted || supervision.timed_out,
            )
            .await;

        info!(
            session = %self.id,
            pid,
            code = exit.code,
            signal = exit.signal,
            aborted = supervision.aborted,
            timed_out = supervision.timed_out,
            "background session exited"
        );

        lock(&self.state).record_exit(exit, background_pids, supervision.timed_out);
        self.exit_tx.send_replace(true);
    }
}

fn append_to(state: SharedState) -> impl FnMut(StreamKind, String) + Send + 'static {
    move |kind, text| lock(&state).append(kind, text)
}

fn generate_session_id() -> String {
    let bytes: [u8; 4] = rand::random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvSection, ProxyConfig};
    use crate::exec::env::EnvironmentResolver;
    use crate::exec::platform::native;

    fn manager() -> SessionManager {
        let env = EnvSection {
            fix_path: false,
            ..EnvSection::default()
        };
        let resolver = Arc::new(EnvironmentResolver::new(&env, Arc::new(None::<ProxyConfig>)));
        let shell = ShellSection::default();
        let launcher = Arc::new(ShellLauncher::new(shell.clone(), resolver, native()));
        SessionManager::new(launcher, &shell)
    }

    fn running_entry(id: &str) -> (watch::Sender<bool>, Arc<SessionEntry>) {
        let (exit_tx, exit_rx) = watch::channel(false);
        let state = SessionState::new(id.to_string(), "sleep 5".to_string(), None, None);
        let entry = Arc::new(SessionEntry {
            state: Arc::new(Mutex::new(state)),
            cancel: CancellationToken::new(),
            exited: exit_rx,
        });
        (exit_tx, entry)
    }

    #[test]
    fn unregister_only_drops_the_matching_entry() {
        let manager = manager();
        let (_stale_tx, stale) = running_entry("x");
        let (_fresh_tx, fresh) = running_entry("x");
        lock(&manager.sessions).insert("x".to_string(), Arc::clone(&fresh));

        manager.unregister("x", &stale);
        assert!(manager.entry("x").is_some_and(|e| Arc::ptr_eq(&e, &fresh)));

        manager.unregister("x", &fresh);
        assert!(manager.entry("x").is_none());
    }

    #[tokio::test]
    async fn remove_keeps_a_newer_session_registered_under_the_same_id() {
        let manager = manager();
        let (stale_tx, stale) = running_entry("x");
        let (_fresh_tx, fresh) = running_entry("x");
        lock(&manager.sessions).insert("x".to_string(), Arc::clone(&stale));

        // While `remove` waits for the old process, the id is released and
        // taken by a new session.
        let reuse = async {
            tokio::task::yield_now().await;
            lock(&manager.sessions).insert("x".to_string(), Arc::clone(&fresh));
            stale_tx.send_replace(true);
        };
        let (removed, ()) = tokio::join!(manager.remove("x"), reuse);

        assert!(removed.is_some());
        assert!(stale.cancel.is_cancelled());
        assert!(!fresh.cancel.is_cancelled());
        assert!(manager.entry("x").is_some_and(|e| Arc::ptr_eq(&e, &fresh)));
    }
}

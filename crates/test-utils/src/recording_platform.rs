use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shellrun::exec::platform::{Invocation, PlatformFuture, ProcessPlatform};
use shellrun::types::PlatformKind;
use tokio::process::Child;

/// Wraps the native platform and records what was asked of it.
///
/// Processes are real; only the bookkeeping is added, so tests can assert
/// e.g. that a cancelled command triggered exactly one tree kill.
#[derive(Debug)]
pub struct RecordingPlatform {
    inner: Arc<dyn ProcessPlatform>,
    spawned: Mutex<Vec<Invocation>>,
    kills: Mutex<Vec<u32>>,
}

impl RecordingPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: shellrun::exec::native(),
            spawned: Mutex::new(Vec::new()),
            kills: Mutex::new(Vec::new()),
        })
    }

    pub fn spawned(&self) -> Vec<Invocation> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<u32> {
        self.kills.lock().unwrap().clone()
    }
}

impl ProcessPlatform for RecordingPlatform {
    fn kind(&self) -> PlatformKind {
        self.inner.kind()
    }

    fn spawn(
        &self,
        invocation: &Invocation,
        cwd: Option<&Path>,
        env: &BTreeMap<String, String>,
    ) -> std::io::Result<Child> {
        self.spawned.lock().unwrap().push(invocation.clone());
        self.inner.spawn(invocation, cwd, env)
    }

    fn kill_tree(
        &self,
        pid: u32,
        grace: Duration,
        exited: Arc<AtomicBool>,
    ) -> PlatformFuture<'_, ()> {
        self.kills.lock().unwrap().push(pid);
        self.inner.kill_tree(pid, grace, exited)
    }

    fn discover_descendants<'a>(
        &'a self,
        aux_file: &'a Path,
        main_pid: Option<u32>,
        aborted: bool,
    ) -> PlatformFuture<'a, Vec<u32>> {
        self.inner.discover_descendants(aux_file, main_pid, aborted)
    }
}

// src/exec/supervise.rs

//! Child supervision shared by the runner and background sessions:
//! attach pipe readers, wait for exit while honouring cancellation and
//! timeout, then give the readers a bounded window to drain.

use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::exec::decode::OutputDecoder;
use crate::exec::platform::ProcessPlatform;
use crate::exec::stream::pump_stream;
use crate::types::{PlatformKind, StreamKind};

pub(crate) struct Supervision {
    pub status: io::Result<ExitStatus>,
    pub aborted: bool,
    pub timed_out: bool,
}

/// Spawn one reader task per captured pipe.
pub(crate) fn attach_readers<F, G>(
    child: &mut Child,
    kind: PlatformKind,
    on_stdout: F,
    on_stderr: G,
) -> Vec<JoinHandle<()>>
where
    F: FnMut(StreamKind, String) + Send + 'static,
    G: FnMut(StreamKind, String) + Send + 'static,
{
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        let decoder = OutputDecoder::for_platform(kind);
        readers.push(tokio::spawn(pump_stream(
            stdout,
            StreamKind::Stdout,
            decoder,
            on_stdout,
        )));
    }
    if let Some(stderr) = child.stderr.take() {
        let decoder = OutputDecoder::for_platform(kind);
        readers.push(tokio::spawn(pump_stream(
            stderr,
            StreamKind::Stderr,
            decoder,
            on_stderr,
        )));
    }
    readers
}

/// Wait for `child` to exit.
///
/// Cancellation and the timeout both start the platform's tree kill in a
/// separate task and keep waiting; the kill is requested at most once.
/// `exited` is set as soon as the child has been reaped.
pub(crate) async fn supervise(
    child: &mut Child,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
    platform: &Arc<dyn ProcessPlatform>,
    kill_grace: Duration,
    exited: &Arc<AtomicBool>,
) -> Supervision {
    let pid = child.id();
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut aborted = false;
    let mut timed_out = false;
    let mut kill_requested = false;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,

            _ = cancel.cancelled(), if !aborted => {
                aborted = true;
                info!(pid, "cancellation requested; killing process tree");
                if !kill_requested {
                    kill_requested = true;
                    start_kill(platform, pid, kill_grace, exited);
                }
            }

            _ = sleep_until_deadline(deadline), if deadline.is_some() && !timed_out => {
                timed_out = true;
                info!(pid, timeout_ms = timeout.map(|t| t.as_millis() as u64), "command timed out; killing process tree");
                if !kill_requested {
                    kill_requested = true;
                    start_kill(platform, pid, kill_grace, exited);
                }
            }
        }
    };

    exited.store(true, Ordering::SeqCst);

    Supervision {
        status,
        aborted,
        timed_out,
    }
}

/// Give readers up to `grace` to reach EOF. Readers still running after
/// that keep draining in the background; their output is ignored.
pub(crate) async fn drain_readers(readers: Vec<JoinHandle<()>>, grace: Duration) {
    let all = async {
        for reader in readers {
            let _ = reader.await;
        }
    };
    if tokio::time::timeout(grace, all).await.is_err() {
        debug!("pipes still held open after exit; finalising without them");
    }
}

fn start_kill(
    platform: &Arc<dyn ProcessPlatform>,
    pid: Option<u32>,
    grace: Duration,
    exited: &Arc<AtomicBool>,
) {
    let Some(pid) = pid else {
        return;
    };
    let platform = Arc::clone(platform);
    let exited = Arc::clone(exited);
    tokio::spawn(async move {
        platform.kill_tree(pid, grace, exited).await;
    });
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

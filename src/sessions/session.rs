// src/sessions/session.rs

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{ExitInfo, StreamKind};

/// One decoded output chunk with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedChunk {
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Mutable per-session record. Written by the session's own reader and
/// monitor tasks; read by the manager.
#[derive(Debug)]
pub(crate) struct SessionState {
    id: String,
    command: String,
    directory: Option<PathBuf>,
    thread_id: Option<String>,
    pid: Option<u32>,
    stdout: Vec<TimedChunk>,
    stderr: Vec<TimedChunk>,
    started_at: DateTime<Utc>,
    last_get_output_time: DateTime<Utc>,
    exit: ExitInfo,
    exited_at: Option<DateTime<Utc>>,
    exit_reported: bool,
    error: Option<String>,
    background_pids: Vec<u32>,
    timed_out: bool,
}

impl SessionState {
    pub(crate) fn new(
        id: String,
        command: String,
        directory: Option<PathBuf>,
        thread_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            command,
            directory,
            thread_id,
            pid: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            started_at: now,
            last_get_output_time: now,
            exit: ExitInfo::default(),
            exited_at: None,
            exit_reported: false,
            error: None,
            background_pids: Vec::new(),
            timed_out: false,
        }
    }

    pub(crate) fn set_pid(&mut self, pid: Option<u32>) {
        self.pid = pid;
    }

    pub(crate) fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub(crate) fn exit(&self) -> ExitInfo {
        self.exit
    }

    pub(crate) fn is_exited(&self) -> bool {
        self.exited_at.is_some()
    }

    pub(crate) fn append(&mut self, kind: StreamKind, text: String) {
        let chunk = TimedChunk {
            text,
            at: Utc::now(),
        };
        match kind {
            StreamKind::Stdout => self.stdout.push(chunk),
            StreamKind::Stderr => self.stderr.push(chunk),
        }
    }

    pub(crate) fn record_spawn_error(&mut self, message: String) {
        self.error = Some(message);
        self.exited_at = Some(Utc::now());
    }

    pub(crate) fn record_wait_error(&mut self, message: String) {
        self.error = Some(message);
    }

    pub(crate) fn record_exit(&mut self, exit: ExitInfo, background_pids: Vec<u32>, timed_out: bool) {
        self.exit = exit;
        self.background_pids = background_pids;
        self.timed_out = timed_out;
        self.exited_at = Some(Utc::now());
    }

    /// Unread output exists, or the exit has not been reported yet.
    pub(crate) fn has_update(&self) -> bool {
        !self.stdout.is_empty()
            || !self.stderr.is_empty()
            || (self.is_exited() && !self.exit_reported)
    }

    /// Hand out everything appended since the previous call and forget it.
    ///
    /// Chunks appended concurrently land either in this snapshot or the
    /// next one; none are lost.
    pub(crate) fn take_unread(&mut self) -> SessionSnapshot {
        self.last_get_output_time = Utc::now();
        if self.is_exited() {
            self.exit_reported = true;
        }
        let stdout = std::mem::take(&mut self.stdout);
        let stderr = std::mem::take(&mut self.stderr);
        SessionSnapshot {
            summary: self.summary(),
            stdout,
            stderr,
        }
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            command: self.command.clone(),
            directory: self.directory.clone(),
            thread_id: self.thread_id.clone(),
            pid: self.pid,
            started_at: self.started_at,
            last_get_output_time: self.last_get_output_time,
            code: self.exit.code,
            signal: self.exit.signal,
            is_exited: self.is_exited(),
            exited_at: self.exited_at,
            error: self.error.clone(),
            background_pids: self.background_pids.clone(),
            timed_out: self.timed_out,
            has_update: self.has_update(),
        }
    }
}

/// Stable, read-only view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub id: String,
    pub command: String,
    pub directory: Option<PathBuf>,
    pub thread_id: Option<String>,
    pub pid: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub last_get_output_time: DateTime<Utc>,
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub is_exited: bool,
    pub exited_at: Option<DateTime<Utc>>,
    /// Spawn or wait failure, if any.
    pub error: Option<String>,
    pub background_pids: Vec<u32>,
    pub timed_out: bool,
    pub has_update: bool,
}

impl SessionSummary {
    pub fn exit(&self) -> ExitInfo {
        ExitInfo {
            code: self.code,
            signal: self.signal,
        }
    }
}

/// What a poll returns: the summary plus output not delivered before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub summary: SessionSummary,
    pub stdout: Vec<TimedChunk>,
    pub stderr: Vec<TimedChunk>,
}

impl SessionSnapshot {
    pub fn stdout_text(&self) -> String {
        self.stdout.iter().map(|c| c.text.as_str()).collect()
    }

    pub fn stderr_text(&self) -> String {
        self.stderr.iter().map(|c| c.text.as_str()).collect()
    }
}

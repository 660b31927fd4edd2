// src/render.rs

//! Plain-text rendering of execution results and session polls, in the
//! shape handed back to a calling agent.

use std::path::Path;

use crate::exec::runner::ExecutionResult;
use crate::sessions::{SessionSnapshot, SessionSummary};
use crate::types::ExitInfo;

const TRUNCATION_MARKER: &str = "\n...[truncated]...\n";

/// Keep the head and tail of `text` when it exceeds `max` characters.
///
/// Roughly 100 characters of the budget are reserved for the marker.
pub fn truncate_text(text: &str, max: usize) -> String {
    let len = text.chars().count();
    if len <= max {
        return text.to_string();
    }

    let half = max.saturating_sub(100) / 2;
    let front: String = text.chars().take(half).collect();
    let back: String = text.chars().skip(len - half).collect();
    format!("{front}{TRUNCATION_MARKER}{back}")
}

fn or_empty(text: &str) -> &str {
    if text.is_empty() { "(empty)" } else { text }
}

fn signal_text(exit: &ExitInfo) -> String {
    match (exit.signal_name(), exit.signal) {
        (Some(name), _) => name.to_string(),
        (None, Some(signal)) => signal.to_string(),
        (None, None) => "(none)".to_string(),
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "(none)".to_string(), |v| v.to_string())
}

/// Summary block for a synchronous run that was not cancelled.
pub fn render_execution(
    result: &ExecutionResult,
    command: &str,
    directory: Option<&Path>,
    max_chars: usize,
) -> String {
    let stdout = if result.stdout.chars().count() > max_chars {
        truncate_text(&result.stdout, 1000)
    } else {
        result.stdout.clone()
    };
    let error = result.error.as_deref().map(|e| {
        if e.chars().count() > max_chars {
            truncate_text(e, 1000)
        } else {
            e.to_string()
        }
    });
    let directory = directory.map_or_else(|| "(root)".to_string(), |d| d.display().to_string());

    [
        format!("Command: {command}"),
        format!("Directory: {directory}"),
        format!("Stdout: {}", or_empty(&stdout)),
        format!("Stderr: {}", or_empty(&result.stderr)),
        format!("Error: {}", optional(error)),
        format!("Exit Code: {}", optional(result.code)),
        format!("Signal: {}", signal_text(&result.exit())),
        format!("Process Group PGID: {}", optional(result.pid)),
    ]
    .join("\n")
}

/// Message for a run the caller cancelled, with whatever it printed first.
pub fn render_cancelled(result: &ExecutionResult, max_chars: usize) -> String {
    let mut message = String::from("Command was cancelled by user before it could complete.");
    let output = result.output.trim();
    if output.is_empty() {
        message.push_str(" There was no output before it was cancelled.");
    } else {
        let output = if output.chars().count() > max_chars {
            truncate_text(output, max_chars / 2)
        } else {
            output.to_string()
        };
        message.push_str(" Below is the output (on stdout and stderr) before it was cancelled:\n");
        message.push_str(&output);
    }
    message
}

fn status(summary: &SessionSummary) -> &'static str {
    if summary.is_exited { "exited" } else { "running" }
}

/// New output and status of a polled background session.
pub fn render_session_output(snapshot: &SessionSnapshot, max_chars: usize) -> String {
    let summary = &snapshot.summary;
    let mut lines = vec![
        format!("Background Bash {}", summary.id),
        format!("Command: {}", summary.command),
        format!("Status: {}", status(summary)),
    ];
    if summary.is_exited {
        lines.push(format!("Exit Code: {}", optional(summary.code)));
        lines.push(format!("Signal: {}", signal_text(&summary.exit())));
    }
    if let Some(error) = &summary.error {
        lines.push(format!("Error: {error}"));
    }
    if summary.timed_out {
        lines.push("Timed out: true".to_string());
    }
    lines.push(format!(
        "Stdout: {}",
        or_empty(&truncate_text(&snapshot.stdout_text(), max_chars))
    ));
    lines.push(format!(
        "Stderr: {}",
        or_empty(&truncate_text(&snapshot.stderr_text(), max_chars))
    ));
    lines.join("\n")
}

/// One-line nudge for a session that has something new to show.
pub fn update_reminder(summary: &SessionSummary) -> String {
    format!(
        "Background Bash {} (command: {}) (status: {}) Has new output available. \
         You can check its output using the BashOutput tool.",
        summary.id,
        summary.command,
        status(summary)
    )
}

pub fn session_not_found(id: &str) -> String {
    format!("No background bash session found with ID: {id}")
}

pub fn background_started(id: &str) -> String {
    format!("Command running in background with ID: {id}")
}

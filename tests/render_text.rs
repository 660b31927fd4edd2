// tests/render_text.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use shellrun::ExecutionResult;
use shellrun::render::{render_cancelled, render_execution, truncate_text};

fn result(stdout: &str, output: &str) -> ExecutionResult {
    ExecutionResult {
        output: output.to_string(),
        stdout: stdout.to_string(),
        stderr: String::new(),
        error: None,
        code: Some(0),
        signal: None,
        background_pids: Vec::new(),
        aux_file_path: PathBuf::from("/tmp/aux"),
        pid: Some(4242),
        timed_out: false,
        aborted: false,
        duration: Duration::from_millis(5),
    }
}

#[test]
fn short_text_is_untouched() {
    assert_eq!(truncate_text("abc", 1000), "abc");
}

#[test]
fn long_text_keeps_head_and_tail() {
    let text: String = "a".repeat(500) + &"z".repeat(500);
    let truncated = truncate_text(&text, 300);

    assert_eq!(truncated, format!("{}\n...[truncated]...\n{}", "a".repeat(100), "z".repeat(100)));
}

#[test]
fn truncation_counts_characters_not_bytes() {
    let text = "é".repeat(400);
    let truncated = truncate_text(&text, 300);

    assert!(truncated.starts_with(&"é".repeat(100)));
    assert!(truncated.ends_with(&"é".repeat(100)));
}

#[test]
fn execution_block_lists_every_field() {
    let mut res = result("hi\n", "hi\n");
    res.code = None;
    res.signal = Some(15);
    res.error = Some("boom".to_string());

    let text = render_execution(&res, "echo hi", Some(Path::new("/work")), 30_000);

    let expected = [
        "Command: echo hi",
        "Directory: /work",
        "Stdout: hi\n",
        "Stderr: (empty)",
        "Error: boom",
        "Exit Code: (none)",
        if cfg!(unix) { "Signal: SIGTERM" } else { "Signal: 15" },
        "Process Group PGID: 4242",
    ]
    .join("\n");
    assert_eq!(text, expected);
}

#[test]
fn oversized_stdout_is_cut_to_a_thousand_characters() {
    let stdout = "x".repeat(5000);
    let text = render_execution(&result(&stdout, &stdout), "yes", None, 1000);

    let stdout_line = text.lines().nth(2).unwrap();
    assert!(stdout_line.starts_with(&format!("Stdout: {}", "x".repeat(450))));
    assert!(text.contains("...[truncated]..."));
    assert!(text.len() < 2000);
}

#[test]
fn cancelled_without_output() {
    let res = result("", "  \n");
    assert_eq!(
        render_cancelled(&res, 30_000),
        "Command was cancelled by user before it could complete. There was no output before it was cancelled."
    );
}

#[test]
fn cancelled_with_long_output_uses_half_budget() {
    let output = "o".repeat(1000);
    let text = render_cancelled(&result("", &output), 400);

    assert!(text.contains("...[truncated]..."));
    // (400 / 2 - 100) / 2 characters survive on each side.
    assert!(text.ends_with(&format!("\n{}", "o".repeat(50))));
}

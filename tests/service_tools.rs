// tests/service_tools.rs
#![cfg(unix)]

mod common;
use crate::common::{ShellConfigBuilder, init_tracing, test_service, with_timeout};

use std::time::Duration;

use shellrun::{BashRequest, ShellError};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn foreground_bash_renders_summary_block() {
    let service = test_service();

    let text = service
        .bash(BashRequest::new("echo hello"), None, None)
        .await
        .unwrap();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Command: echo hello");
    assert_eq!(lines[1], "Directory: (root)");
    assert_eq!(lines[2], "Stdout: hello");
    assert!(text.contains("Stderr: (empty)"));
    assert!(text.contains("Error: (none)"));
    assert!(text.contains("Exit Code: 0"));
    assert!(text.contains("Signal: (none)"));
    assert!(text.contains("Process Group PGID: "));
}

#[test]
fn bash_request_deserializes_with_optional_fields() {
    let request: BashRequest = toml::from_str(
        r#"
command = "ls"
directory = "/tmp"
timeout = 1000
run_in_background = true
"#,
    )
    .unwrap();

    assert_eq!(request.command, "ls");
    assert_eq!(request.timeout, Some(1000));
    assert!(request.run_in_background);
    assert!(request.description.is_none());
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let service = test_service();
    let mut request = BashRequest::new("ls");
    request.directory = Some("/no/such/dir".into());

    let err = service.bash(request, None, None).await.unwrap_err();
    assert_eq!(err.to_string(), "Directory /no/such/dir does not exist");
}

#[tokio::test]
async fn file_as_directory_is_an_error() {
    let service = test_service();
    let file = tempfile::NamedTempFile::new().unwrap();
    let mut request = BashRequest::new("ls");
    request.directory = Some(file.path().to_path_buf());

    let err = service.bash(request, None, None).await.unwrap_err();
    assert!(matches!(err, ShellError::NotADirectory(_)));
    assert!(err.to_string().ends_with("is not a directory"));
}

#[tokio::test]
async fn default_timeout_applies_to_foreground_runs() {
    init_tracing();
    let service = ShellConfigBuilder::new()
        .default_timeout_ms(100)
        .max_timeout_ms(200)
        .service();

    let text = with_timeout(service.bash(BashRequest::new("sleep 5"), None, None))
        .await
        .unwrap();

    assert!(text.contains("Signal: SIGTERM") || text.contains("Signal: SIGKILL"), "{text}");
}

#[tokio::test]
async fn cancelled_bash_reports_partial_output() {
    let service = test_service();
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let text = with_timeout(service.bash(BashRequest::new("echo partial; sleep 5"), Some(token), None))
        .await
        .unwrap();

    assert_eq!(
        text,
        "Command was cancelled by user before it could complete. \
         Below is the output (on stdout and stderr) before it was cancelled:\npartial"
    );
}

#[tokio::test]
async fn background_bash_returns_id_then_output_is_polled() {
    let service = test_service();
    let mut request = BashRequest::new("echo from-background");
    request.run_in_background = true;

    let text = service.bash(request, None, Some("chat-1")).await.unwrap();
    let id = text
        .strip_prefix("Command running in background with ID: ")
        .expect("background start message")
        .to_string();
    assert_eq!(id.len(), 8);

    for _ in 0..40 {
        let exited = service
            .sessions()
            .sessions(Some("chat-1"))
            .first()
            .is_some_and(|s| s.is_exited);
        if exited {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let reminders = service.pending_reminders("chat-1");
    assert_eq!(reminders.len(), 1);
    assert!(reminders[0].starts_with(&format!(
        "Background Bash {id} (command: echo from-background) (status: exited) Has new output available."
    )));
    assert!(service.pending_reminders("other-chat").is_empty());

    let output = service.bash_output(&id);
    assert!(output.contains("Status: exited"), "{output}");
    assert!(output.contains("Stdout: from-background"), "{output}");
    assert!(output.contains("Exit Code: 0"), "{output}");

    assert!(service.pending_reminders("chat-1").is_empty());
    assert_eq!(
        service.bash_output(&id),
        format!("No background bash session found with ID: {id}")
    );
}

#[tokio::test]
async fn kill_bash_stops_session() {
    let service = test_service();
    let mut request = BashRequest::new("echo started; sleep 5");
    request.run_in_background = true;
    let text = service.bash(request, None, None).await.unwrap();
    let id = text.rsplit(' ').next().unwrap().to_string();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let killed = with_timeout(service.kill_bash(&id)).await;
    assert!(killed.starts_with(&format!("Killed background bash {id}")), "{killed}");
    assert!(killed.contains("Status: exited"));
    assert!(killed.contains("Stdout: started"));

    assert!(service.kill_bash(&id).await.starts_with("No background bash session found"));
}

#[tokio::test]
async fn proxy_set_at_runtime_reaches_children() {
    let service = test_service();
    service.set_proxy(Some(shellrun::ProxyConfig {
        host: "127.0.0.1".to_string(),
        port: 9999,
    }));

    let text = service
        .bash(BashRequest::new("printf %s \"$HTTPS_PROXY\""), None, None)
        .await
        .unwrap();
    assert!(text.contains("Stdout: http://127.0.0.1:9999"), "{text}");

    service.set_proxy(None);
    let text = service
        .bash(BashRequest::new("printf %s \"${HTTPS_PROXY:-unset}\""), None, None)
        .await
        .unwrap();
    // Host value (if any) or the fallback; never the old proxy.
    assert!(!text.contains("127.0.0.1:9999"), "{text}");
}

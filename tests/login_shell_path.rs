// tests/login_shell_path.rs
#![cfg(unix)]

mod common;
use crate::common::{ShellConfigBuilder, init_tracing, with_timeout};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use shellrun::exec::OutputObserver;
use shellrun::{CommandSpec, ShellService};
use tempfile::TempDir;

/// Write an executable `/bin/sh` script standing in for the user's login
/// shell. It is invoked as `<script> -ilc <query>`.
fn login_shell(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn service_with_login_shell(shell: &Path, timeout_ms: u64) -> ShellService {
    init_tracing();
    ShellConfigBuilder::new()
        .fix_path(true)
        .login_shell(&shell.to_string_lossy())
        .login_shell_timeout_ms(timeout_ms)
        .service()
}

#[tokio::test]
async fn slow_login_shell_does_not_delay_background_start() {
    let dir = TempDir::new().unwrap();
    let shell = login_shell(dir.path(), "slow-login", "sleep 2\n");
    let service = service_with_login_shell(&shell, 5_000);

    let started = Instant::now();
    let handle = service
        .sessions()
        .run_in_background(CommandSpec::new("echo hi"), None, None)
        .unwrap();
    let id = handle.id().to_string();
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "id took {:?}",
        started.elapsed()
    );

    // The registry answers while the lookup is still running.
    let early = service.sessions().get_session(&id).unwrap();
    assert!(!early.summary.is_exited);
    assert!(!service.sessions().has_update(&id));
    assert!(started.elapsed() < Duration::from_millis(500));

    let exit = with_timeout(handle.wait()).await;
    assert_eq!(exit.code, Some(0));
    let last = service.sessions().get_session(&id).unwrap();
    assert_eq!(last.stdout_text(), "hi\n");
}

#[tokio::test]
async fn hung_login_shell_is_abandoned_after_timeout() {
    let dir = TempDir::new().unwrap();
    let shell = login_shell(dir.path(), "hung-login", "exec sleep 30\n");
    let service = service_with_login_shell(&shell, 1_500);

    let started = Instant::now();
    let result = with_timeout(
        service
            .runner()
            .run_command(CommandSpec::new("echo ok"), OutputObserver::default()),
    )
    .await
    .unwrap();

    assert!(result.success(), "{result:?}");
    assert_eq!(result.stdout, "ok\n");
    assert!(
        started.elapsed() < Duration::from_secs(4),
        "run took {:?}",
        started.elapsed()
    );

    // The failed lookup is cached; later runs do not wait again.
    let again = Instant::now();
    service
        .runner()
        .run_command(CommandSpec::new("true"), OutputObserver::default())
        .await
        .unwrap();
    assert!(again.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn login_path_entries_come_first() {
    let dir = TempDir::new().unwrap();
    let shell = login_shell(
        dir.path(),
        "profile-login",
        "PATH=\"/shellrun-login-bin:$PATH\"\nexport PATH\nexec /bin/sh -c \"$2\"\n",
    );
    let service = service_with_login_shell(&shell, 5_000);

    let result = with_timeout(
        service
            .runner()
            .run_command(CommandSpec::new("printf '%s' \"$PATH\""), OutputObserver::default()),
    )
    .await
    .unwrap();

    assert!(
        result.stdout.starts_with("/shellrun-login-bin:"),
        "PATH was {:?}",
        result.stdout
    );
    let inherited = std::env::var("PATH").unwrap_or_default();
    for entry in inherited.split(':').filter(|e| !e.is_empty()) {
        assert!(
            result.stdout.split(':').any(|e| e == entry),
            "{entry} missing from {:?}",
            result.stdout
        );
    }
}

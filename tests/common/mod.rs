#![allow(dead_code)]

pub use shellrun_test_utils::builders::ShellConfigBuilder;
pub use shellrun_test_utils::{init_tracing, with_timeout};

use shellrun::ShellService;

/// Service with defaults suitable for tests (no login-shell PATH lookup).
pub fn test_service() -> ShellService {
    init_tracing();
    ShellConfigBuilder::new().service()
}

/// True when `program` can be found on `PATH`.
pub fn on_path(program: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {program}"))
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

// tests/env_resolver.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use shellrun::config::{EnvSection, ProxyConfig};
use shellrun::exec::{EnvironmentResolver, ProxySource, merge_path_lists};

fn section(extra: &[(&str, &str)]) -> EnvSection {
    EnvSection {
        fix_path: false,
        extra: extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
        ..EnvSection::default()
    }
}

fn no_proxy() -> Arc<dyn ProxySource> {
    Arc::new(None::<ProxyConfig>)
}

#[tokio::test]
async fn host_environment_is_inherited() {
    let resolver = EnvironmentResolver::new(&section(&[]), no_proxy());
    let env = resolver.resolve(&HashMap::new()).await;

    // PATH is set in any sane test environment.
    assert_eq!(env.get("PATH"), std::env::var("PATH").ok().as_ref());
}

#[tokio::test]
async fn proxy_is_injected_when_configured() {
    let proxy: Arc<dyn ProxySource> = Arc::new(Some(ProxyConfig {
        host: "10.0.0.1".to_string(),
        port: 3128,
    }));
    let resolver = EnvironmentResolver::new(&section(&[]), proxy);
    let env = resolver.resolve(&HashMap::new()).await;

    assert_eq!(env.get("HTTP_PROXY").map(String::as_str), Some("http://10.0.0.1:3128"));
    assert_eq!(env.get("HTTPS_PROXY").map(String::as_str), Some("http://10.0.0.1:3128"));
}

#[tokio::test]
async fn proxy_changes_apply_to_later_resolutions() {
    let shared = Arc::new(RwLock::new(None::<ProxyConfig>));
    let source: Arc<dyn ProxySource> = shared.clone();
    let resolver = EnvironmentResolver::new(&section(&[]), source);

    let before = resolver.resolve(&HashMap::new()).await;
    *shared.write().unwrap() = Some(ProxyConfig {
        host: "proxy.local".to_string(),
        port: 8080,
    });
    let after = resolver.resolve(&HashMap::new()).await;

    assert_eq!(
        after.get("HTTPS_PROXY").map(String::as_str),
        Some("http://proxy.local:8080")
    );
    assert_ne!(before.get("HTTPS_PROXY"), after.get("HTTPS_PROXY"));
}

#[tokio::test]
async fn overrides_beat_config_extras() {
    let resolver = EnvironmentResolver::new(
        &section(&[("SHELLRUN_TEST_A", "from-config"), ("SHELLRUN_TEST_B", "kept")]),
        no_proxy(),
    );
    let overrides = HashMap::from([("SHELLRUN_TEST_A".to_string(), "from-call".to_string())]);
    let env = resolver.resolve(&overrides).await;

    assert_eq!(env.get("SHELLRUN_TEST_A").map(String::as_str), Some("from-call"));
    assert_eq!(env.get("SHELLRUN_TEST_B").map(String::as_str), Some("kept"));
}

#[tokio::test]
async fn missing_login_shell_keeps_inherited_path() {
    let section = EnvSection {
        fix_path: true,
        login_shell: Some("/nonexistent/shellrun-login-shell".to_string()),
        ..EnvSection::default()
    };
    let resolver = EnvironmentResolver::new(&section, no_proxy());
    let env = resolver.resolve(&HashMap::new()).await;

    assert_eq!(env.get("PATH"), std::env::var("PATH").ok().as_ref());
}

#[test]
fn merged_path_puts_login_entries_first_without_duplicates() {
    let merged = merge_path_lists(
        "/opt/homebrew/bin:/usr/bin",
        Some("/usr/bin:/bin::/usr/bin"),
    );
    assert_eq!(merged, "/opt/homebrew/bin:/usr/bin:/bin");
}

#[test]
fn merged_path_without_current_path() {
    assert_eq!(merge_path_lists("/a:/b", None), "/a:/b");
}

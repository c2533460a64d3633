use std::time::Duration;

use ac_core::config::{Config, ConfigError};
use ac_core::types::Policy;
use ac_core::vcs::{CommitIdentity, VcsBackendKind};

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.log_level, "info");
    assert!(!cfg.general.log_json);
    assert_eq!(cfg.watch.debounce_ms, 1000);
    assert_eq!(cfg.watch.quiet_period(), Duration::from_secs(1));
    assert_eq!(cfg.vcs.backend, "git");
    assert_eq!(cfg.vcs.command_timeout_secs, 30);
    assert_eq!(cfg.oracle.api_key_env, "GEMINI_API_KEY");
    assert!(cfg.oracle.offline_commit);
    assert!(cfg.bridge.enabled);
    assert_eq!(cfg.bridge.host, "127.0.0.1");
    assert_eq!(cfg.bridge.port, 8765);
    assert!(cfg.session.record_skips);
    assert_eq!(cfg.policy.initial_policy(), Policy::default());
    cfg.validate().expect("defaults validate");
}

#[test]
fn config_roundtrip() {
    let mut cfg = Config::default();
    cfg.vcs.author_name = Some("Robot".into());
    cfg.vcs.author_email = Some("robot@example.com".into());
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("gemini-2.0-flash"));

    let parsed: Config = toml::from_str(&toml_str).expect("parse toml back");
    assert_eq!(parsed.watch.debounce_ms, cfg.watch.debounce_ms);
    assert_eq!(parsed.bridge.port, cfg.bridge.port);
    assert_eq!(parsed.vcs.author_email.as_deref(), Some("robot@example.com"));
    parsed.validate().expect("config validates");
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[watch]
debounce_ms = 250

[vcs]
backend = "jj"
"#;
    let cfg: Config = toml::from_str(partial).expect("parse partial");
    assert_eq!(cfg.watch.debounce_ms, 250);
    assert_eq!(cfg.vcs.backend_kind().unwrap(), VcsBackendKind::Jujutsu);
    // defaults should fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.bridge.port, 8765);
    cfg.validate().expect("config validates");
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[policy]
commit_frequency_hint = "commit after every test run"

[bridge]
enabled = false
port = 0
"#,
    )
    .unwrap();

    let cfg = Config::load_from(&path).expect("load");
    assert_eq!(
        cfg.policy.initial_policy().commit_frequency_hint,
        "commit after every test run"
    );
    assert!(!cfg.bridge.enabled);
}

#[test]
fn load_from_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(dir.path().join("nope.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn malformed_toml_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[watch\ndebounce_ms = ").unwrap();
    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn zero_debounce_fails_validation() {
    let mut cfg = Config::default();
    cfg.watch.debounce_ms = 0;
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("debounce_ms"));
}

#[test]
fn unknown_backend_fails_validation() {
    let mut cfg = Config::default();
    cfg.vcs.backend = "svn".into();
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("svn"));
}

#[test]
fn half_an_identity_fails_validation() {
    let mut cfg = Config::default();
    cfg.vcs.author_name = Some("Robot".into());
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("author_email"));
}

#[test]
fn enabled_bridge_needs_a_port() {
    let mut cfg = Config::default();
    cfg.bridge.port = 0;
    assert!(cfg.validate().is_err());
    cfg.bridge.enabled = false;
    cfg.validate().expect("disabled bridge ignores the port");
}

#[test]
fn vcs_options_carry_identity_and_timeout() {
    let mut cfg = Config::default();
    cfg.vcs.command_timeout_secs = 5;
    cfg.vcs.author_name = Some("Robot".into());
    cfg.vcs.author_email = Some("robot@example.com".into());
    let options = cfg.vcs.options();
    assert_eq!(options.command_timeout, Duration::from_secs(5));
    assert_eq!(
        options.identity,
        Some(CommitIdentity::new("Robot", "robot@example.com"))
    );
}

#[test]
fn oracle_api_key_comes_from_the_named_variable() {
    let mut cfg = Config::default();
    cfg.oracle.api_key_env = "AUTOCOMMIT_TEST_UNSET_KEY_VARIABLE".into();
    assert_eq!(cfg.oracle.api_key(), None);
}

use std::env;
use std::io::Write;

use feedguard::{load_config, load_config_with_options, ConfigError, LoadOptions};
use pretty_assertions::assert_eq;
use serial_test::serial;

const TOUCHED: &[&str] = &[
    "FEEDGUARD__CACHE__CAPACITY",
    "FEEDGUARD__LOGGING__LEVEL",
    "FEEDGUARD__AUTHORITY__THRESHOLD",
    "FEEDGUARD__CACHE__COLOUR",
    "FEEDGUARD_CONFIG_JSON",
];

struct EnvGuard;

impl EnvGuard {
    fn clean() -> Self {
        for key in TOUCHED {
            env::remove_var(key);
        }
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in TOUCHED {
            env::remove_var(key);
        }
    }
}

fn yaml(contents: &str) -> anyhow::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
#[serial]
fn layers_apply_in_order() -> anyhow::Result<()> {
    let _env = EnvGuard::clean();
    let file = yaml(
        "cache:\n  capacity: 200\n  ttl_ms: 30000\ncoalescer:\n  quiet_window_ms: 250\nlogging:\n  level: debug\n",
    )?;

    env::set_var("FEEDGUARD__CACHE__CAPACITY", "300");
    env::set_var("FEEDGUARD__AUTHORITY__THRESHOLD", "2.5");
    env::set_var("FEEDGUARD_CONFIG_JSON", r#"{"logging": {"json": true}}"#);

    let config = load_config(Some(file.path()))?;
    assert_eq!(config.cache.capacity, 300);
    assert_eq!(config.cache.ttl_ms, 30_000);
    assert_eq!(config.coalescer.quiet_window_ms, 250);
    assert_eq!(config.authority.threshold, 2.5);
    assert_eq!(config.logging.level, "debug");
    assert!(config.logging.json);
    // untouched sections keep their defaults
    assert_eq!(config.discovery.content_timeout_ms, 10_000);
    Ok(())
}

#[test]
#[serial]
fn missing_file_and_env_give_defaults() -> anyhow::Result<()> {
    let _env = EnvGuard::clean();
    let dir = tempfile::tempdir()?;
    let config = load_config(Some(&dir.path().join("absent.yaml")))?;
    assert_eq!(config, feedguard::FeedGuardConfig::default());
    Ok(())
}

#[test]
#[serial]
fn env_is_skipped_when_disabled() -> anyhow::Result<()> {
    let _env = EnvGuard::clean();
    env::set_var("FEEDGUARD__CACHE__CAPACITY", "7");
    let config = load_config_with_options(&LoadOptions::default())?;
    assert_eq!(config.cache.capacity, 500);
    Ok(())
}

#[test]
#[serial]
fn unknown_keys_and_bad_values_are_errors() -> anyhow::Result<()> {
    let _env = EnvGuard::clean();
    env::set_var("FEEDGUARD__CACHE__COLOUR", "blue");
    let err = load_config(None).expect_err("unknown key");
    assert!(matches!(err, ConfigError::UnsupportedPath(path) if path == "cache.colour"));
    env::remove_var("FEEDGUARD__CACHE__COLOUR");

    let file = yaml("cache:\n  capacity: 0\n")?;
    let err = load_config_with_options(&LoadOptions {
        paths: vec![file.path().to_path_buf()],
        include_env: false,
    })
    .expect_err("zero capacity");
    assert!(matches!(err, ConfigError::InvalidValue { .. }));

    env::set_var("FEEDGUARD_CONFIG_JSON", "{not json");
    assert!(matches!(load_config(None), Err(ConfigError::Invalid(_))));
    Ok(())
}

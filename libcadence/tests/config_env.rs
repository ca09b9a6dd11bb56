//! Configuration loaded from the real process environment
//!
//! These tests mutate process-wide environment variables, so they run
//! serially.

use libcadence::config::{
    Config, ENV_CHALLENGE_POLICY, ENV_CONFIG, ENV_MESSAGED_STORE, ENV_PASSWORD, ENV_TARGET_ACCOUNT,
    ENV_USERNAME,
};
use libcadence::{CadenceError, Category};
use serial_test::serial;
use std::fs;
use tempfile::TempDir;

const ALL_VARS: &[&str] = &[
    ENV_USERNAME,
    ENV_PASSWORD,
    ENV_TARGET_ACCOUNT,
    ENV_MESSAGED_STORE,
    ENV_CONFIG,
    ENV_CHALLENGE_POLICY,
];

fn clear_env() {
    for var in ALL_VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_requires_credentials() {
    clear_env();

    let error = Config::from_env().unwrap_err();

    assert_eq!(error.exit_code(), 2);
    assert!(matches!(error, CadenceError::Config(_)));
    assert!(error.to_string().contains(ENV_USERNAME));
}

#[test]
#[serial]
fn test_from_env_merges_config_file() {
    clear_env();
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("cadence.toml");
    let store_path = temp_dir.path().join("state").join("messaged.txt");
    fs::write(
        &config_path,
        r#"
target_account = "@from_file"

[quotas]
likes = 12

[timing]
cycle_interval = "5m"
"#,
    )
    .unwrap();

    std::env::set_var(ENV_USERNAME, "operator");
    std::env::set_var(ENV_PASSWORD, "hunter2");
    std::env::set_var(ENV_CONFIG, &config_path);
    std::env::set_var(ENV_MESSAGED_STORE, &store_path);
    std::env::set_var(ENV_TARGET_ACCOUNT, "@from_env");

    let config = Config::from_env().unwrap();
    clear_env();

    assert_eq!(config.credentials.username(), "operator");
    assert_eq!(config.target_account.as_deref(), Some("from_env"));
    assert_eq!(config.messaged_store, store_path);
    assert_eq!(config.quota.limit(Category::Likes), 12);
    assert_eq!(config.quota.limit(Category::Dms), 20);
    assert_eq!(config.timing.cycle_interval.as_secs(), 300);
}

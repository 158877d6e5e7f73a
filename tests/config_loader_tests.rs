//! Integration tests for layered configuration loading.
//!
//! These write real `.env` files into a temp directory and load through
//! `ConfigLoader::with_base_dir`, so they exercise the same precedence rules
//! the binary sees: `.env` < `.env.local` < `.env.<profile>` <
//! `.env.<profile>.local` < process environment.

use std::fs;

use base64::{engine::general_purpose, Engine as _};
use broker::config::{ConfigError, ConfigLoader};
use tempfile::TempDir;

fn vault_key_b64() -> String {
    general_purpose::STANDARD.encode([9u8; 32])
}

fn write_env(dir: &TempDir, name: &str, contents: &str) {
    fs::write(dir.path().join(name), contents).expect("write env file");
}

fn base_env() -> String {
    format!(
        "BROKER_ADMIN_TOKEN=base-token\nBROKER_VAULT_KEY={}\nBROKER_ENABLED_PLATFORMS=example\n",
        vault_key_b64()
    )
}

#[test]
fn loads_defaults_plus_base_env() {
    let dir = TempDir::new().unwrap();
    write_env(&dir, ".env", &base_env());

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("valid config");

    assert_eq!(config.profile, "local");
    assert_eq!(config.admin_tokens, vec!["base-token".to_string()]);
    assert_eq!(config.enabled_platforms, vec!["example".to_string()]);
    assert_eq!(config.vault_key.as_ref().map(|k| k.len()), Some(32));
    // Worker sections fall back to their defaults.
    assert_eq!(config.sync_worker.poll_interval_seconds, 30);
    assert_eq!(config.enrichment_worker.max_attempts, 3);
}

#[test]
fn profile_env_file_overrides_base() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!("{}BROKER_PROFILE=staging\nBROKER_LOG_LEVEL=info\n", base_env()),
    );
    write_env(&dir, ".env.staging", "BROKER_LOG_LEVEL=debug\n");

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("valid config");

    assert_eq!(config.profile, "staging");
    assert_eq!(config.log_level, "debug");
}

#[test]
fn local_overlay_wins_over_profile_file() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!("{}BROKER_PROFILE=staging\n", base_env()),
    );
    write_env(&dir, ".env.staging", "BROKER_API_BIND_ADDR=0.0.0.0:9000\n");
    write_env(
        &dir,
        ".env.staging.local",
        "BROKER_API_BIND_ADDR=127.0.0.1:9001\n",
    );

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("valid config");

    assert_eq!(config.api_bind_addr, "127.0.0.1:9001");
}

#[test]
fn platform_credentials_are_collected_per_key() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!(
            "{}BROKER_PLATFORM_META_CLIENT_ID=meta-id\n\
             BROKER_PLATFORM_META_CLIENT_SECRET=meta-secret\n\
             BROKER_PLATFORM_META_AUTH_BASE=https://mock.test/meta\n",
            base_env()
        ),
    );

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("valid config");

    let meta = config.platform("meta").expect("meta settings");
    assert_eq!(meta.client_id.as_deref(), Some("meta-id"));
    assert_eq!(meta.client_secret.as_deref(), Some("meta-secret"));
    assert_eq!(meta.auth_base.as_deref(), Some("https://mock.test/meta"));
}

#[test]
fn admin_token_list_is_split_and_trimmed() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!(
            "BROKER_ADMIN_TOKENS=alpha, beta ,gamma,\nBROKER_VAULT_KEY={}\n",
            vault_key_b64()
        ),
    );

    let config = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect("valid config");

    assert_eq!(
        config.admin_tokens,
        vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]
    );
}

#[test]
fn invalid_vault_key_base64_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        "BROKER_ADMIN_TOKEN=token\nBROKER_VAULT_KEY=!!!not-base64!!!\n",
    );

    let err = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect_err("bad key must fail");
    assert!(matches!(err, ConfigError::InvalidVaultKeyBase64 { .. }));
}

#[test]
fn missing_admin_token_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!("BROKER_VAULT_KEY={}\n", vault_key_b64()),
    );

    let err = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect_err("missing tokens must fail");
    assert!(matches!(err, ConfigError::MissingAdminTokens));
}

#[test]
fn invalid_bind_addr_is_fatal() {
    let dir = TempDir::new().unwrap();
    write_env(
        &dir,
        ".env",
        &format!("{}BROKER_API_BIND_ADDR=not-an-addr\n", base_env()),
    );

    let err = ConfigLoader::with_base_dir(dir.path().to_path_buf())
        .load()
        .expect_err("bad bind addr must fail");
    assert!(matches!(err, ConfigError::InvalidBindAddr { .. }));
}

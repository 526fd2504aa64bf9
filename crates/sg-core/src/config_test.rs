use super::*;
use serial_test::serial;
use std::collections::HashMap;

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("name: callbreak").unwrap();
    assert_eq!(config.name, "callbreak");
    assert_eq!(config.database.db_type, DbType::DuckDb);
    assert_eq!(config.database.path, ":memory:");
    assert_eq!(config.reconcile.max_retries, 5);
    assert_eq!(config.reconcile.base_backoff_ms, 3000);
    assert_eq!(config.reconcile.backoff, BackoffStrategy::Linear);
    assert_eq!(config.reconcile.ledger_table, "__schemagate_ledger");
    config.validate().unwrap();
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
name: callbreak
database:
  type: postgres
  url: "postgres://app:secret@db:5432/callbreak"
reconcile:
  max_retries: 8
  base_backoff_ms: 500
  backoff: exponential
  max_backoff_ms: 4000
  lock_timeout_ms: 30000
  connect_timeout_ms: 2000
  ledger_table: ops.schema_ledger
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.database.db_type, DbType::Postgres);
    let policy = config.reconcile.backoff_policy();
    assert_eq!(policy.strategy, BackoffStrategy::Exponential);
    assert_eq!(policy.base, Duration::from_millis(500));
    assert_eq!(policy.max_backoff, Duration::from_millis(4000));
    assert_eq!(policy.max_retries, 8);
    assert_eq!(config.reconcile.lock_timeout(), Duration::from_secs(30));
    assert_eq!(config.reconcile.connect_timeout(), Duration::from_secs(2));
}

#[test]
fn test_unknown_fields_rejected() {
    let result: Result<Config, _> = serde_yaml::from_str("name: x\nretries: 3");
    assert!(result.is_err());
}

#[test]
fn test_validate_rejects_zero_retries() {
    let config: Config =
        serde_yaml::from_str("name: x\nreconcile:\n  max_retries: 0").unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("max_retries"));
}

#[test]
fn test_validate_rejects_postgres_without_url() {
    let config: Config = serde_yaml::from_str("name: x\ndatabase:\n  type: postgres").unwrap();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("database.url"));
}

#[test]
fn test_validate_rejects_bad_ledger_table() {
    let config: Config =
        serde_yaml::from_str("name: x\nreconcile:\n  ledger_table: \"bad name\"").unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("schemagate.yml"),
        "name: from_file\ndatabase:\n  path: app.duckdb\n",
    )
    .unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "from_file");
    assert_eq!(config.database.path, "app.duckdb");
}

#[test]
fn test_load_from_dir_accepts_yaml_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("schemagate.yaml"), "name: yaml_ext\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "yaml_ext");
}

#[test]
fn test_load_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_load_invalid_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schemagate.yml");
    std::fs::write(&path, "name: [unclosed").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, CoreError::YamlParse(_)));
}

#[test]
fn test_overrides_from_lookup() {
    let vars: HashMap<&str, &str> = [
        (ENV_DATABASE_URL, "postgres://u:p@localhost/db"),
        (ENV_MAX_RETRIES, "7"),
        (ENV_BASE_BACKOFF_MS, "250"),
    ]
    .into_iter()
    .collect();

    let mut config = Config::default();
    config
        .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
        .unwrap();

    assert_eq!(config.database.db_type, DbType::Postgres);
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://u:p@localhost/db")
    );
    assert_eq!(config.reconcile.max_retries, 7);
    assert_eq!(config.reconcile.base_backoff_ms, 250);
}

#[test]
fn test_override_with_garbage_number_fails() {
    let mut config = Config::default();
    let err = config
        .apply_overrides_from(|key| (key == ENV_MAX_RETRIES).then(|| "lots".to_string()))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_MAX_RETRIES));
}

#[test]
#[serial]
fn test_env_overrides() {
    std::env::set_var(ENV_DATABASE_PATH, "/tmp/override.duckdb");
    let mut config = Config::default();
    let result = config.apply_env_overrides();
    std::env::remove_var(ENV_DATABASE_PATH);

    result.unwrap();
    assert_eq!(config.database.db_type, DbType::DuckDb);
    assert_eq!(config.database.path, "/tmp/override.duckdb");
}

#[test]
#[serial]
fn test_env_overrides_absent_leave_config_untouched() {
    std::env::remove_var(ENV_DATABASE_URL);
    std::env::remove_var(ENV_DATABASE_PATH);
    std::env::remove_var(ENV_MAX_RETRIES);
    std::env::remove_var(ENV_BASE_BACKOFF_MS);
    let mut config = Config::default();
    config.apply_env_overrides().unwrap();
    assert_eq!(config.database.path, ":memory:");
    assert_eq!(config.reconcile.max_retries, 5);
}

#[test]
fn test_redact_password() {
    assert_eq!(
        redact_password("postgres://app:hunter2@db:5432/callbreak"),
        "postgres://app:***@db:5432/callbreak"
    );
    assert_eq!(
        redact_password("postgres://app@db/callbreak"),
        "postgres://app@db/callbreak"
    );
    assert_eq!(redact_password("not a url"), "not a url");
}

#[test]
fn test_display_target_masks_password() {
    let config: Config = serde_yaml::from_str(
        "name: x\ndatabase:\n  type: postgres\n  url: postgres://a:b@h/d\n",
    )
    .unwrap();
    assert_eq!(config.database.display_target(), "postgres://a:***@h/d");
}

#[test]
fn test_load_defers_validation_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("schemagate.yml"),
        "name: app\ndatabase:\n  type: postgres\n",
    )
    .unwrap();
    let mut config = Config::load_from_dir(dir.path()).unwrap();
    assert!(config.validate().is_err());

    config
        .apply_overrides_from(|key| {
            (key == ENV_DATABASE_URL).then(|| "postgres://app@db/app".to_string())
        })
        .unwrap();
    config.validate().unwrap();
}

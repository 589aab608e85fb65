use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use objtozip::load_config::{load_config, ENV_ENDPOINT_URL, ENV_REGION, ENV_STAGING_DIR};

fn clear_env() {
    env::remove_var(ENV_STAGING_DIR);
    env::remove_var(ENV_REGION);
    env::remove_var(ENV_ENDPOINT_URL);
}

/// A full config file is mapped onto pipeline and storage settings.
#[test]
#[serial]
fn test_load_config_reads_all_sections() {
    clear_env();
    let config_yaml = r#"
pipeline:
  staging_dir: /var/tmp/objtozip
storage:
  region: eu-west-1
  endpoint_url: "http://localhost:9000"
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(Some(config_file.path())).expect("Config should load");

    assert_eq!(
        config.pipeline.staging_dir,
        PathBuf::from("/var/tmp/objtozip")
    );
    assert_eq!(config.storage.region.as_deref(), Some("eu-west-1"));
    assert_eq!(
        config.storage.endpoint_url.as_deref(),
        Some("http://localhost:9000")
    );
}

/// Sections left out of the file fall back to defaults.
#[test]
#[serial]
fn test_load_config_partial_file_uses_defaults() {
    clear_env();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "storage:\n  region: us-east-2\n").unwrap();

    let config = load_config(Some(config_file.path())).expect("Config should load");

    assert_eq!(config.pipeline.staging_dir, env::temp_dir());
    assert_eq!(config.storage.region.as_deref(), Some("us-east-2"));
    assert!(config.storage.endpoint_url.is_none());
}

#[test]
#[serial]
fn test_load_config_without_file_uses_defaults() {
    clear_env();
    let config = load_config(None).expect("Defaults should load");

    assert_eq!(config.pipeline.staging_dir, env::temp_dir());
    assert!(config.storage.region.is_none());
}

/// Environment variables win over the file.
#[test]
#[serial]
fn test_env_overrides_file_values() {
    clear_env();
    let config_file = NamedTempFile::new().expect("temp file");
    write(
        config_file.path(),
        "pipeline:\n  staging_dir: /from/file\nstorage:\n  region: eu-west-1\n",
    )
    .unwrap();

    env::set_var(ENV_STAGING_DIR, "/from/env");
    env::set_var(ENV_REGION, "ap-southeast-2");
    env::set_var(ENV_ENDPOINT_URL, "http://minio:9000");

    let config = load_config(Some(config_file.path())).expect("Config should load");
    clear_env();

    assert_eq!(config.pipeline.staging_dir, PathBuf::from("/from/env"));
    assert_eq!(config.storage.region.as_deref(), Some("ap-southeast-2"));
    assert_eq!(
        config.storage.endpoint_url.as_deref(),
        Some("http://minio:9000")
    );
}

#[test]
#[serial]
fn test_load_config_missing_file_is_an_error() {
    clear_env();
    let err = load_config(Some(std::path::Path::new("does-not-exist.yaml")))
        .expect_err("Missing file should fail");
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
#[serial]
fn test_load_config_invalid_yaml_is_an_error() {
    clear_env();
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "pipeline: [not, a, map]\n").unwrap();

    let err = load_config(Some(config_file.path())).expect_err("Invalid YAML should fail");
    assert!(err.to_string().contains("Failed to parse config YAML"));
}

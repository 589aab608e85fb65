/// `load_config` module: loads the optional YAML config file and applies environment overrides.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into [`AppConfig`] (every section is optional)
/// - Overlay `OBJTOZIP_*` environment variables, which win over the file
/// - Fail with clear diagnostics when a given file cannot be read or parsed
///
/// # Accepted YAML
/// ```yaml
/// pipeline:
///   staging_dir: /tmp
/// storage:
///   region: eu-west-1
///   endpoint_url: http://localhost:9000
/// ```
use anyhow::{Context, Result};
use objtozip_core::config::PipelineConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const ENV_STAGING_DIR: &str = "OBJTOZIP_STAGING_DIR";
pub const ENV_REGION: &str = "OBJTOZIP_REGION";
pub const ENV_ENDPOINT_URL: &str = "OBJTOZIP_ENDPOINT_URL";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageSettings,
}

/// How to reach the object store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageSettings {
    /// Overrides the region from the AWS default provider chain.
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible providers; enables path-style addressing.
    pub endpoint_url: Option<String>,
}

/// Loads the config file when one is given, then applies environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            info!("No config file given, using defaults");
            AppConfig::default()
        }
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = fs::read_to_string(path)
        .inspect_err(|e| error!(error = ?e, config_path = ?path, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {:?}", path))?;

    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    let config: AppConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| error!(error = ?e, config_path = ?path, "Failed to parse config YAML"))
        .context("Failed to parse config YAML")?;
    info!(config_path = ?path, "Parsed config YAML successfully");
    Ok(config)
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Some(dir) = non_empty_var(ENV_STAGING_DIR) {
        config.pipeline.staging_dir = PathBuf::from(dir);
    }
    if let Some(region) = non_empty_var(ENV_REGION) {
        config.storage.region = Some(region);
    }
    if let Some(endpoint) = non_empty_var(ENV_ENDPOINT_URL) {
        config.storage.endpoint_url = Some(endpoint);
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

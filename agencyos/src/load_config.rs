/// `load_config` module: loads the static YAML config of the CLI and applies environment overrides.
///
/// This module is the only place where user-supplied YAML is parsed into typed structs.
///
/// # Responsibilities
/// - Parse the YAML file into [`AppConfig`]: the core [`PlannerConfig`] sections (`storage`,
///   `media`, `report`) plus the CLI-only `dropbox` and `data_file` keys
/// - Apply environment overrides (`AGENCYOS_DATA_FILE`); secrets such as
///   `DROPBOX_ACCESS_TOKEN` are never read from the file
/// - Fail with clear diagnostics: every failure is logged and returned as `anyhow::Error`
///
/// Every key has a default, so an empty file is a valid config.
use agencyos_core::config::PlannerConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DATA_FILE_ENV: &str = "AGENCYOS_DATA_FILE";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub dropbox: DropboxSettings,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
}

/// Endpoints of the Dropbox HTTP API. Overridable for tests and proxies.
#[derive(Debug, Clone, Deserialize)]
pub struct DropboxSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_content_base")]
    pub content_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DropboxSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            content_base: default_content_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.dropboxapi.com/2".to_string()
}

fn default_content_base() -> String {
    "https://content.dropboxapi.com/2".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_data_file() -> PathBuf {
    PathBuf::from("agencyos.json")
}

/// Loads a YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config = parse_config(&config_content)
        .with_context(|| format!("Invalid config file {:?}", path_ref))?;

    if let Ok(data_file) = std::env::var(DATA_FILE_ENV) {
        if !data_file.trim().is_empty() {
            info!(data_file = %data_file, "Data file overridden from environment");
            config.data_file = PathBuf::from(data_file);
        }
    }

    config.planner.trace_loaded();
    Ok(config)
}

/// Parses YAML text. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<AppConfig> {
    let content = if content.trim().is_empty() { "{}" } else { content };
    match serde_yaml::from_str::<AppConfig>(content) {
        Ok(conf) => {
            info!("Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

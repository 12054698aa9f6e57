//! Application configuration for omeka-harvest.
//!
//! User config lives at `~/.omeka-harvest/harvest.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{HarvestError, Result};
use crate::types::FieldMap;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "harvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".omeka-harvest";

// ---------------------------------------------------------------------------
// Config structs (matching harvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source API location and paging.
    #[serde(default)]
    pub api: ApiConfig,

    /// Request fan-out, timeouts and retries.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Semantic field name → element id.
    #[serde(default)]
    pub fields: FieldMap,
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root of the Omeka site, e.g. `https://omeka.example.org`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Items endpoint, relative to `base_url`.
    #[serde(default = "default_items_endpoint")]
    pub items_endpoint: String,

    /// Files endpoint, relative to `base_url`.
    #[serde(default = "default_files_endpoint")]
    pub files_endpoint: String,

    /// Items per page as configured on the Omeka site.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Response header holding the total number of results.
    #[serde(default = "default_total_results_header")]
    pub total_results_header: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            items_endpoint: default_items_endpoint(),
            files_endpoint: default_files_endpoint(),
            page_size: default_page_size(),
            total_results_header: default_total_results_header(),
        }
    }
}

fn default_base_url() -> String {
    "https://omeka.coloredconventions.org".into()
}
fn default_items_endpoint() -> String {
    "api/items".into()
}
fn default_files_endpoint() -> String {
    "api/files".into()
}
fn default_page_size() -> u32 {
    50
}
fn default_total_results_header() -> String {
    "omeka-total-results".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum requests in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Growth factor applied to the delay after each retry.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound on the delay between retries.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Whether to look up image URLs for items with files.
    #[serde(default = "default_true")]
    pub thumbnails: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            thumbnails: true,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_concurrency() -> u32 {
    8
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    250
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_max_backoff_ms() -> u64 {
    5_000
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Semantic field name → element id.
    pub field_map: FieldMap,
    /// Items per API page.
    pub page_size: u32,
    /// Root of the Omeka site.
    pub api_base_url: String,
    /// Items endpoint, relative to `api_base_url`.
    pub items_endpoint: String,
    /// Files endpoint, relative to `api_base_url`.
    pub files_endpoint: String,
    /// Header carrying the total result count.
    pub total_results_header: String,
    /// Fan-out, timeout and retry settings.
    pub fetch: FetchConfig,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            field_map: config.fields.clone(),
            page_size: config.api.page_size,
            api_base_url: config.api.base_url.clone(),
            items_endpoint: config.api.items_endpoint.clone(),
            files_endpoint: config.api.files_endpoint.clone(),
            total_results_header: config.api.total_results_header.clone(),
            fetch: config.fetch.clone(),
        }
    }
}

impl PipelineConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(HarvestError::config("page_size must be greater than zero"));
        }
        if self.fetch.concurrency == 0 {
            return Err(HarvestError::config("concurrency must be greater than zero"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(HarvestError::config("timeout_secs must be greater than zero"));
        }
        if self.fetch.backoff_multiplier < 1.0 {
            return Err(HarvestError::config("backoff_multiplier must be at least 1.0"));
        }
        if self.total_results_header.trim().is_empty() {
            return Err(HarvestError::config("total_results_header must not be empty"));
        }
        self.field_map.validate()?;
        self.items_url()?;
        self.files_url()?;
        Ok(())
    }

    /// Absolute URL of the items endpoint.
    pub fn items_url(&self) -> Result<Url> {
        endpoint_url(&self.api_base_url, &self.items_endpoint)
    }

    /// Absolute URL of the files endpoint.
    pub fn files_url(&self) -> Result<Url> {
        endpoint_url(&self.api_base_url, &self.files_endpoint)
    }
}

/// Join an endpoint onto the site root, keeping any path prefix of the root.
fn endpoint_url(base: &str, endpoint: &str) -> Result<Url> {
    let mut root = Url::parse(base)
        .map_err(|e| HarvestError::config(format!("invalid base_url '{base}': {e}")))?;
    if !root.path().ends_with('/') {
        let path = format!("{}/", root.path());
        root.set_path(&path);
    }
    root.join(endpoint.trim_start_matches('/'))
        .map_err(|e| HarvestError::config(format!("invalid endpoint '{endpoint}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.omeka-harvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HarvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.omeka-harvest/harvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HarvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| HarvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| HarvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| HarvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("omeka-total-results"));
        assert!(toml_str.contains("[fields]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.api.page_size, 50);
        assert_eq!(parsed.fetch, FetchConfig::default());
        assert_eq!(parsed.fields, FieldMap::default());
    }

    #[test]
    fn config_with_custom_fields() {
        let toml_str = r#"
[api]
base_url = "https://archive.example.org/omeka"
page_size = 25

[fields]
title = 50
date = 40
gps = 95
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.api.page_size, 25);
        assert_eq!(config.api.items_endpoint, "api/items");
        assert_eq!(config.fields.id_of("gps"), Some(95));
        assert_eq!(config.fields.id_of("city"), None);
        assert_eq!(config.fetch.concurrency, 8);
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from(&app);
        assert_eq!(pipeline.page_size, 50);
        assert_eq!(pipeline.fetch.max_retries, 3);
        assert!(pipeline.validate().is_ok());
        assert_eq!(
            pipeline.items_url().unwrap().as_str(),
            "https://omeka.coloredconventions.org/api/items"
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let url = endpoint_url("https://archive.example.org/omeka", "/api/files").unwrap();
        assert_eq!(url.as_str(), "https://archive.example.org/omeka/api/files");
    }

    #[test]
    fn zero_page_size_is_config_error() {
        let mut pipeline = PipelineConfig::from(&AppConfig::default());
        pipeline.page_size = 0;
        let err = pipeline.validate().unwrap_err();
        assert!(matches!(err, HarvestError::Config { .. }));
    }

    #[test]
    fn invalid_base_url_is_config_error() {
        let mut pipeline = PipelineConfig::from(&AppConfig::default());
        pipeline.api_base_url = "not a url".into();
        assert!(pipeline.validate().is_err());
    }

    #[test]
    fn load_config_from_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("omeka-harvest-does-not-exist.toml");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, HarvestError::Io { .. }));
    }
}

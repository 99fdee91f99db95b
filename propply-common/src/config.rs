//! Configuration loading and config file resolution
//!
//! Settings come from a single bootstrap TOML file. Every field has a
//! built-in default so a missing file or a missing section is not an error.
//!
//! # Config file priority
//!
//! 1. Command-line argument (`--config`)
//! 2. Environment variable (`PROPPLY_CONFIG`)
//! 3. OS-dependent default (`<config dir>/propply/propply.toml`)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{Error, Result};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "PROPPLY_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub soda: SodaConfig,

    #[serde(default)]
    pub aggregation: AggregationConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// NYC Open Data (SODA) access
#[derive(Debug, Clone, Deserialize)]
pub struct SodaConfig {
    #[serde(default = "default_soda_base_url")]
    pub base_url: String,

    /// Application token sent as `X-App-Token`
    #[serde(default)]
    pub app_token: Option<String>,

    /// API key id for HTTP basic auth
    #[serde(default)]
    pub api_key_id: Option<String>,

    /// API key secret for HTTP basic auth
    #[serde(default)]
    pub api_key_secret: Option<String>,

    #[serde(default = "default_soda_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed backoff before the single retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Outbound request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Overrides every dataset's default page size when set
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl Default for SodaConfig {
    fn default() -> Self {
        Self {
            base_url: default_soda_base_url(),
            app_token: None,
            api_key_id: None,
            api_key_secret: None,
            timeout_secs: default_soda_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            requests_per_second: default_requests_per_second(),
            page_size: None,
        }
    }
}

/// Compliance aggregation settings
#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Cap on records fetched per domain
    #[serde(default = "default_max_records")]
    pub max_records_per_domain: usize,

    /// Records echoed per domain in compliance responses
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Query FDNY violations unless the request says otherwise
    #[serde(default = "default_true")]
    pub include_fdny: bool,

    /// Try the next search key when a key returns zero rows
    #[serde(default = "default_true")]
    pub fallback_on_empty: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            max_records_per_domain: default_max_records(),
            sample_size: default_sample_size(),
            include_fdny: true,
            fallback_on_empty: true,
        }
    }
}

/// External analysis service
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// Webhook URL; analysis is disabled when absent
    #[serde(default)]
    pub url: Option<String>,

    /// Outer timeout for one analysis call
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,

    /// Calls slower than this are logged as slow
    #[serde(default = "default_analysis_expected_secs")]
    pub expected_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_analysis_timeout_secs(),
            expected_secs: default_analysis_expected_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5780".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_soda_base_url() -> String {
    "https://data.cityofnewyork.us/resource".to_string()
}

fn default_soda_timeout_secs() -> u64 {
    30
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_max_records() -> usize {
    1000
}

fn default_sample_size() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_analysis_timeout_secs() -> u64 {
    120
}

fn default_analysis_expected_secs() -> u64 {
    40
}

impl TomlConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig =
            toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load the config file if it exists, otherwise fall back to defaults
    ///
    /// A missing file is logged and tolerated; a file that exists but does not
    /// parse or validate is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        info!("Loading config from {}", path.display());
        Self::load(path)
    }

    /// Reject values the services cannot run with
    pub fn validate(&self) -> Result<()> {
        if let Some(page_size) = self.soda.page_size {
            if page_size == 0 || page_size > 50_000 {
                return Err(Error::Config(format!(
                    "soda.page_size must be between 1 and 50000, got {}",
                    page_size
                )));
            }
        }
        if self.soda.requests_per_second == 0 {
            return Err(Error::Config(
                "soda.requests_per_second must be greater than 0".to_string(),
            ));
        }
        if self.soda.timeout_secs == 0 {
            return Err(Error::Config(
                "soda.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.analysis.timeout_secs == 0 {
            return Err(Error::Config(
                "analysis.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.aggregation.max_records_per_domain == 0 {
            return Err(Error::Config(
                "aggregation.max_records_per_domain must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the config file path
///
/// Priority: CLI argument, then the `PROPPLY_CONFIG` environment variable,
/// then the OS default location. The returned path may not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    default_config_path()
}

/// OS-dependent default config file path
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("propply").join("propply.toml"))
        .unwrap_or_else(|| PathBuf::from("./propply.toml"))
}

/// Read a trimmed, non-empty environment variable
pub fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

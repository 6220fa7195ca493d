//! Engine configuration.
//!
//! Loaded from TOML. Every section falls back to defaults, so a partial file
//! only needs the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Top-level configuration for the experiments engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Significance test parameters.
    pub statistics: StatisticsConfig,
    /// Tracking URL and redirect settings.
    pub tracking: TrackingConfig,
    /// Result store update policy.
    pub store: StoreConfig,
}

/// Parameters of the significance test and winner rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    /// Opens each variant needs before any verdict is attempted.
    pub min_sample_size: u64,
    /// CTR difference in percentage points a winner must exceed.
    pub min_ctr_gap: f64,
    /// p-value below which a result is reported at 99%.
    pub significance_99: f64,
    /// p-value below which a result is reported at 95%.
    pub significance_95: f64,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            min_sample_size: 30,
            min_ctr_gap: 1.0,
            significance_99: 0.01,
            significance_95: 0.05,
        }
    }
}

/// Where tracking links point and where clicks are sent afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Public base URL of the application.
    pub base_url: String,
    /// Redirect target when neither the link nor the experiment names one.
    pub default_redirect: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            default_redirect: "https://example.com".to_string(),
        }
    }
}

/// Optimistic concurrency settings for result updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Attempts at the read-modify-write cycle before a conflict is returned.
    pub max_update_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_update_retries: 16,
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config_from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
pub fn parse_config(toml_content: &str) -> Result<EngineConfig> {
    toml::from_str(toml_content).map_err(|e| Error::Config(format!("invalid config TOML: {}", e)))
}

/// Load configuration with fallback to defaults.
pub fn load_config_or_default(path: impl AsRef<Path>) -> EngineConfig {
    load_config_from_file(path).unwrap_or_default()
}

/// Check configuration for values the engine cannot work with.
pub fn validate_config(config: &EngineConfig) -> Result<()> {
    let stats = &config.statistics;

    if stats.min_sample_size == 0 {
        return Err(Error::Config("min_sample_size must be at least 1".into()));
    }
    if stats.min_ctr_gap.is_nan() || stats.min_ctr_gap < 0.0 {
        return Err(Error::Config("min_ctr_gap must be non-negative".into()));
    }
    if !(0.0 < stats.significance_99
        && stats.significance_99 < stats.significance_95
        && stats.significance_95 < 1.0)
    {
        return Err(Error::Config(
            "significance thresholds must satisfy 0 < significance_99 < significance_95 < 1"
                .into(),
        ));
    }
    if config.store.max_update_retries == 0 {
        return Err(Error::Config("max_update_retries must be at least 1".into()));
    }

    Url::parse(&config.tracking.base_url)
        .map_err(|e| Error::Config(format!("invalid base_url: {}", e)))?;
    Url::parse(&config.tracking.default_redirect)
        .map_err(|e| Error::Config(format!("invalid default_redirect: {}", e)))?;

    Ok(())
}

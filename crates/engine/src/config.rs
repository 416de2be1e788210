//! Engine configuration.
//!
//! Loaded from `deal-engine.toml` with `DEAL_`-prefixed environment
//! overrides. Malformed configuration is non-recoverable: the process must
//! refuse work rather than run with guessed values.

use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the deal engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// BMV% at which the value score saturates.
    pub target_bmv_percent: f64,
    /// Timeout applied to each source fetch, seconds.
    pub fetch_timeout_secs: u64,
    /// Comparable sales file (JSON array of completed sales).
    pub comps_path: Option<PathBuf>,
    /// Postcode centroid table (JSON map of outward code to coordinates).
    pub centroids_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_bmv_percent: 20.0,
            fetch_timeout_secs: 30,
            comps_path: None,
            centroids_path: None,
        }
    }
}

impl EngineConfig {
    /// Load from `deal-engine.toml` (optional) and `DEAL_*` environment
    /// variables, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("target_bmv_percent", 20.0)?
            .set_default("fetch_timeout_secs", 30)?
            .add_source(config::File::with_name("deal-engine").required(false))
            .add_source(config::Environment::with_prefix("DEAL"))
            .build()?;
        let loaded: EngineConfig = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_bmv_percent.is_finite() || self.target_bmv_percent <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "target_bmv_percent must be positive, got {}",
                self.target_bmv_percent
            )));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

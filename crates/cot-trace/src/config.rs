//! Validator configuration
//!
//! The schema registry is embedded and never configurable. The only tunable
//! values are the freshness window constants and strict mode, which may come
//! from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, TraceError};

/// Freshness window and decay constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessConfig {
    /// Age (hours) below which evidence scores 1.0
    pub current_window_hours: u64,
    /// Age (days) at which linear decay reaches `stale_floor`
    pub stale_threshold_days: u64,
    /// Score reached at the stale threshold
    pub stale_floor: f64,
    /// Score for anything older than the stale threshold
    pub minimum_score: f64,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            current_window_hours: 24,
            stale_threshold_days: 180,
            stale_floor: 0.5,
            minimum_score: 0.3,
        }
    }
}

impl FreshnessConfig {
    /// Load configuration from environment variables
    ///
    /// Reads:
    /// - COT_FRESHNESS_CURRENT_WINDOW_HOURS
    /// - COT_FRESHNESS_STALE_DAYS
    /// - COT_FRESHNESS_STALE_FLOOR
    /// - COT_FRESHNESS_MINIMUM
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of the current values
    pub fn with_env_overrides(self) -> Self {
        Self {
            current_window_hours: env_or("COT_FRESHNESS_CURRENT_WINDOW_HOURS", self.current_window_hours),
            stale_threshold_days: env_or("COT_FRESHNESS_STALE_DAYS", self.stale_threshold_days),
            stale_floor: env_or("COT_FRESHNESS_STALE_FLOOR", self.stale_floor),
            minimum_score: env_or("COT_FRESHNESS_MINIMUM", self.minimum_score),
        }
    }

    /// Set the current window
    pub fn with_current_window_hours(mut self, hours: u64) -> Self {
        self.current_window_hours = hours;
        self
    }

    /// Set the stale threshold
    pub fn with_stale_threshold_days(mut self, days: u64) -> Self {
        self.stale_threshold_days = days;
        self
    }

    /// Set the score reached at the stale threshold
    pub fn with_stale_floor(mut self, floor: f64) -> Self {
        self.stale_floor = floor;
        self
    }

    /// Set the score used past the stale threshold
    pub fn with_minimum_score(mut self, minimum: f64) -> Self {
        self.minimum_score = minimum;
        self
    }

    /// Reject inconsistent constants
    pub fn validate(&self) -> Result<()> {
        let window_secs = self.current_window_hours.saturating_mul(3600);
        let stale_secs = self.stale_threshold_days.saturating_mul(86_400);
        if window_secs >= stale_secs {
            return Err(TraceError::config(format!(
                "current window ({}h) must be shorter than stale threshold ({}d)",
                self.current_window_hours, self.stale_threshold_days
            )));
        }
        if !(0.0..=1.0).contains(&self.minimum_score) {
            return Err(TraceError::config(format!(
                "minimum score {} outside [0, 1]",
                self.minimum_score
            )));
        }
        if self.stale_floor < self.minimum_score || self.stale_floor > 1.0 {
            return Err(TraceError::config(format!(
                "stale floor {} must lie in [{}, 1]",
                self.stale_floor, self.minimum_score
            )));
        }
        Ok(())
    }
}

/// Top-level validator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Freshness calculator constants
    pub freshness: FreshnessConfig,
    /// Treat a Warn verdict as failing
    pub strict: bool,
}

impl ValidatorConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ValidatorConfig = toml::from_str(content)?;
        config.freshness.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TraceError::Io(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `COT_FRESHNESS_*` environment overrides
    pub fn with_env_overrides(mut self) -> Self {
        self.freshness = self.freshness.with_env_overrides();
        self
    }

    /// Enable strict mode
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Replace the freshness constants
    pub fn with_freshness(mut self, freshness: FreshnessConfig) -> Self {
        self.freshness = freshness;
        self
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

//! Evidence freshness scoring
//!
//! Scores depend only on the timestamps, the configuration and the injected
//! evaluation instant. Nothing here reads the system clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::FreshnessConfig;
use crate::model::EvidenceTimestamps;

const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Recency bucket derived from the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreshnessCategory {
    Current,
    Recent,
    Stale,
    /// Neither `modified` nor `created` is known
    Unknown,
}

impl FreshnessCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            FreshnessCategory::Current
        } else if score >= 0.6 {
            FreshnessCategory::Recent
        } else {
            FreshnessCategory::Stale
        }
    }
}

impl fmt::Display for FreshnessCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreshnessCategory::Current => write!(f, "current"),
            FreshnessCategory::Recent => write!(f, "recent"),
            FreshnessCategory::Stale => write!(f, "stale"),
            FreshnessCategory::Unknown => write!(f, "unknown"),
        }
    }
}

/// Freshness of one evidence item
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Freshness {
    pub category: FreshnessCategory,
    /// `None` when the category is unknown
    pub score: Option<f64>,
}

impl Freshness {
    pub const UNKNOWN: Freshness = Freshness {
        category: FreshnessCategory::Unknown,
        score: None,
    };

    pub fn is_stale(&self) -> bool {
        self.category == FreshnessCategory::Stale
    }
}

/// Scores evidence against a fixed evaluation instant
#[derive(Debug, Clone)]
pub struct FreshnessCalculator {
    config: FreshnessConfig,
    now: DateTime<Utc>,
}

impl FreshnessCalculator {
    pub fn new(config: FreshnessConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn config(&self) -> &FreshnessConfig {
        &self.config
    }

    /// Freshness from `modified`, falling back to `created`
    pub fn assess(&self, timestamps: &EvidenceTimestamps) -> Freshness {
        match timestamps.modified.or(timestamps.created) {
            Some(reference) => {
                let score = self.score_at(reference);
                Freshness {
                    category: FreshnessCategory::from_score(score),
                    score: Some(score),
                }
            }
            None => Freshness::UNKNOWN,
        }
    }

    /// Score for evidence last touched at `reference`
    ///
    /// Full score inside the current window, then a linear decay to the stale
    /// floor at the stale threshold, then the minimum beyond it. Instants
    /// after `now` count as age zero.
    pub fn score_at(&self, reference: DateTime<Utc>) -> f64 {
        let age_secs = (self.now - reference).num_seconds().max(0) as f64;
        let window = self.config.current_window_hours as f64 * SECONDS_PER_HOUR;
        let threshold = self.config.stale_threshold_days as f64 * SECONDS_PER_DAY;

        if age_secs <= window {
            return 1.0;
        }
        if age_secs > threshold || threshold <= window {
            return self.config.minimum_score;
        }
        let progress = (age_secs - window) / (threshold - window);
        1.0 - progress * (1.0 - self.config.stale_floor)
    }
}

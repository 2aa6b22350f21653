//! Baseline suppression configuration parsing from environment variables.

use anyhow::Result;
use std::path::PathBuf;

use super::{Lookup, parse_opt, parse_or};
use crate::application::suppression::SuppressionThresholds;
use crate::domain::errors::DetectionError;
use crate::domain::types::SeriesKind;

/// Suppression environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SuppressionEnvConfig {
    pub enabled: bool,
    pub thresholds: SuppressionThresholds,
    /// Optional TOML file with per-series overrides.
    pub series_config_path: Option<PathBuf>,
}

impl Default for SuppressionEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            thresholds: SuppressionThresholds::default(),
            series_config_path: None,
        }
    }
}

impl SuppressionEnvConfig {
    /// Unset thresholds fall back to the defaults of `series`.
    pub fn from_source(lookup: Lookup, series: SeriesKind) -> Result<Self> {
        let defaults = SuppressionThresholds::for_series(series);
        Ok(Self {
            enabled: parse_or(lookup, "SUPPRESSION_ENABLED", true)?,
            thresholds: SuppressionThresholds {
                relative_pct: parse_or(lookup, "SUPPRESSION_RELATIVE_PCT", defaults.relative_pct)?,
                absolute: parse_or(lookup, "SUPPRESSION_ABSOLUTE", defaults.absolute)?,
            },
            series_config_path: parse_opt(lookup, "SERIES_CONFIG_PATH")?,
        })
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        for (key, value) in [
            ("SUPPRESSION_RELATIVE_PCT", self.thresholds.relative_pct),
            ("SUPPRESSION_ABSOLUTE", self.thresholds.absolute),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(DetectionError::InvalidConfig {
                    key: key.to_string(),
                    reason: format!("{} must be a non-negative number", value),
                });
            }
        }
        Ok(())
    }
}

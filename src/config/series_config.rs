//! Per-series tuning file.
//!
//! ```toml
//! [demand]
//! absolute = 800.0
//!
//! [price]
//! window = 288
//! relative_pct = 40.0
//! absolute = 25.0
//! ```
//!
//! Values present in the file take precedence over the environment for the
//! configured series.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use super::{DetectionEnvConfig, SuppressionEnvConfig};
use crate::domain::types::SeriesKind;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesOverride {
    pub window: Option<usize>,
    pub relative_pct: Option<f64>,
    pub absolute: Option<f64>,
}

impl SeriesOverride {
    pub fn apply(&self, detection: &mut DetectionEnvConfig, suppression: &mut SuppressionEnvConfig) {
        if let Some(window) = self.window {
            detection.feature_window = Some(window);
        }
        if let Some(pct) = self.relative_pct {
            suppression.thresholds.relative_pct = pct;
        }
        if let Some(abs) = self.absolute {
            suppression.thresholds.absolute = abs;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeriesConfigFile {
    pub demand: Option<SeriesOverride>,
    pub price: Option<SeriesOverride>,
}

impl SeriesConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read series config file: {:?}", path))?;
        toml::from_str(&content).context(format!("Failed to parse series config TOML: {:?}", path))
    }

    pub fn for_series(&self, series: SeriesKind) -> Option<&SeriesOverride> {
        match series {
            SeriesKind::Demand => self.demand.as_ref(),
            SeriesKind::Price => self.price.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_file() {
        let file: SeriesConfigFile = toml::from_str("[demand]\nabsolute = 650.0\n").unwrap();
        assert!(file.price.is_none());
        assert_eq!(
            file.for_series(SeriesKind::Demand),
            Some(&SeriesOverride {
                window: None,
                relative_pct: None,
                absolute: Some(650.0),
            })
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(toml::from_str::<SeriesConfigFile>("[demand]\nabsolut = 650.0\n").is_err());
    }

    #[test]
    fn test_apply_only_present_values() {
        let mut detection = DetectionEnvConfig::default();
        let mut suppression = SuppressionEnvConfig::default();
        SeriesOverride {
            window: Some(12),
            relative_pct: None,
            absolute: None,
        }
        .apply(&mut detection, &mut suppression);

        assert_eq!(detection.window(), 12);
        assert_eq!(suppression.thresholds.relative_pct, 30.0);
    }
}

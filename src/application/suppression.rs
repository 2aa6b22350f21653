//! Baseline suppression of model anomaly flags.
//!
//! A flagged point keeps its flag only when it is far from the hourly norm in
//! both relative and absolute terms. The pass can clear flags but never sets
//! one, so running it twice changes nothing.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::baseline::BaselineProfile;
use crate::domain::types::{ForecastBatch, SeriesKind};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionThresholds {
    /// Minimum deviation from the hourly mean, in percent of that mean.
    pub relative_pct: f64,
    /// Minimum deviation from the hourly mean, in series units (MW, $/MWh).
    pub absolute: f64,
}

impl SuppressionThresholds {
    pub fn for_series(series: SeriesKind) -> Self {
        let (relative_pct, absolute) = series.default_suppression();
        Self { relative_pct, absolute }
    }
}

/// Demand thresholds.
impl Default for SuppressionThresholds {
    fn default() -> Self {
        Self::for_series(SeriesKind::Demand)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuppressionReport {
    pub before: usize,
    pub after: usize,
}

impl SuppressionReport {
    pub fn suppressed(&self) -> usize {
        self.before - self.after
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineSuppressor {
    thresholds: SuppressionThresholds,
}

impl BaselineSuppressor {
    pub fn new(thresholds: SuppressionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> SuppressionThresholds {
        self.thresholds
    }

    /// True when a value is far enough from `expected` to stay flagged.
    pub fn is_significant(&self, value: f64, expected: f64) -> bool {
        let deviation = (value - expected).abs();
        let deviation_pct = if expected.abs() > f64::EPSILON {
            deviation / expected.abs() * 100.0
        } else {
            f64::INFINITY
        };
        deviation_pct >= self.thresholds.relative_pct && deviation >= self.thresholds.absolute
    }

    /// Clears flags on points that sit close to the baseline hourly mean.
    pub fn apply(&self, batch: &mut ForecastBatch, baseline: &BaselineProfile) -> SuppressionReport {
        let before = batch.anomalies_detected;

        for point in batch.predictions.iter_mut().filter(|p| p.is_anomaly) {
            let expected = baseline.lookup(point.timestamp.hour()).mean;
            if !self.is_significant(point.value, expected) {
                debug!(
                    "Suppressing flag at {}: value {:.1} vs expected {:.1}",
                    point.timestamp, point.value, expected
                );
                point.clear_anomaly();
            }
        }

        batch.recount();
        let report = SuppressionReport {
            before,
            after: batch.anomalies_detected,
        };
        info!(
            "Baseline suppression: {} -> {} anomalies ({} suppressed)",
            report.before,
            report.after,
            report.suppressed()
        );
        report
    }
}

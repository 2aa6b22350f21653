//! Baseline profile of "normal" grid behaviour.
//!
//! A profile summarises a historical slice per hour of day (and per weekday)
//! and doubles as a cheap secondary classifier, independent of any trained
//! model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::types::{CalendarMonth, SeriesKind, Severity, Timestamp};

pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Pearson correlation between hourly mean price and hourly mean demand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceDemandCorrelation {
    pub generated_at: DateTime<Utc>,
    pub correlation: f64,
    /// Local (date, hour) buckets observed in both series.
    pub matched_hours: usize,
}

/// Distribution summary of one group of observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub mean: f64,
    /// Sample standard deviation; 0 when the group has a single observation.
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub p95: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
    pub days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineProfile {
    pub series: SeriesKind,
    /// Month the profile was built from, `None` for the all-data profile.
    pub month: Option<CalendarMonth>,
    pub generated_at: DateTime<Utc>,
    pub data_period: DataPeriod,
    pub overall: SummaryStats,
    /// Hour of day (0-23) to stats. Hours without observations hold `overall`.
    pub hourly: BTreeMap<u32, SummaryStats>,
    /// Keyed by `DAY_NAMES`; only days with observations are present.
    pub day_of_week: BTreeMap<String, SummaryStats>,
    pub weekday: Option<SummaryStats>,
    pub weekend: Option<SummaryStats>,
    /// Five hours with the highest mean, highest first.
    pub peak_hours: Vec<u32>,
}

/// Result of comparing one value against the hourly norm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviationAssessment {
    pub is_anomalous: bool,
    pub deviation_std: f64,
    pub severity: Severity,
    pub expected_mean: f64,
    /// `mean ± 2 std`.
    pub expected_range: (f64, f64),
    pub actual_value: f64,
}

impl BaselineProfile {
    /// Expected statistics for an hour of day, falling back to `overall`.
    pub fn lookup(&self, hour: u32) -> &SummaryStats {
        self.hourly.get(&hour).unwrap_or(&self.overall)
    }

    /// Expected statistics for a weekday (0 = Monday), falling back to the hourly view.
    pub fn lookup_day(&self, day_of_week: u32, hour: u32) -> &SummaryStats {
        DAY_NAMES
            .get(day_of_week as usize)
            .and_then(|name| self.day_of_week.get(*name))
            .unwrap_or_else(|| self.lookup(hour))
    }

    /// Classifies `value` by its distance from the hour's mean, in standard deviations.
    ///
    /// `is_anomalous` uses `threshold_std`; `severity` uses the fixed 2 / 2.5 / 3 tiers.
    pub fn classify_deviation(&self, value: f64, hour: u32, threshold_std: f64) -> DeviationAssessment {
        let expected = self.lookup(hour);
        let deviation = if expected.std > 0.0 {
            (value - expected.mean) / expected.std
        } else {
            0.0
        };

        DeviationAssessment {
            is_anomalous: deviation.abs() > threshold_std,
            deviation_std: round2(deviation),
            severity: Severity::from_deviation_std(deviation),
            expected_mean: expected.mean,
            expected_range: (
                round2(expected.mean - 2.0 * expected.std),
                round2(expected.mean + 2.0 * expected.std),
            ),
            actual_value: value,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

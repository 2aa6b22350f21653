use chrono::{DateTime, Datelike, FixedOffset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::DetectionError;

/// Zoned timestamp. Every observation carries the UTC offset it was recorded
/// under, so hour-of-day and calendar month are always local to the grid.
pub type Timestamp = DateTime<FixedOffset>;

/// A single observation of a grid series (MW for demand, $/MWh for price).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Which grid series a pipeline runs over. Both share the same machinery,
/// they differ in sampling cadence and default rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesKind {
    Demand,
    Price,
}

impl SeriesKind {
    /// Column name of the raw value, also the prefix of derived features.
    pub fn target_name(&self) -> &'static str {
        match self {
            SeriesKind::Demand => "demand_mw",
            SeriesKind::Price => "price",
        }
    }

    /// 24 hourly points for demand, 288 five-minute points (24h) for price.
    pub fn default_window(&self) -> usize {
        match self {
            SeriesKind::Demand => 24,
            SeriesKind::Price => 288,
        }
    }

    pub fn cadence(&self) -> TimeDelta {
        match self {
            SeriesKind::Demand => TimeDelta::hours(1),
            SeriesKind::Price => TimeDelta::minutes(5),
        }
    }

    /// Default suppression thresholds as `(relative_pct, absolute)`, the
    /// absolute part in series units: 800 MW for demand, $25/MWh for price.
    pub fn default_suppression(&self) -> (f64, f64) {
        match self {
            SeriesKind::Demand => (30.0, 800.0),
            SeriesKind::Price => (30.0, 25.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesKind::Demand => "demand",
            SeriesKind::Price => "price",
        }
    }
}

impl fmt::Display for SeriesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeriesKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "demand" => Ok(SeriesKind::Demand),
            "price" => Ok(SeriesKind::Price),
            _ => anyhow::bail!("Invalid SERIES: {}. Must be 'demand' or 'price'", s),
        }
    }
}

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Calendar month, 1 = January .. 12 = December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CalendarMonth(u32);

impl CalendarMonth {
    pub fn new(month: u32) -> Result<Self, DetectionError> {
        if (1..=12).contains(&month) {
            Ok(Self(month))
        } else {
            Err(DetectionError::InvalidMonth(month))
        }
    }

    /// Local calendar month of a timestamp.
    pub fn of(timestamp: &Timestamp) -> Self {
        Self(timestamp.month())
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    pub fn name(&self) -> &'static str {
        MONTH_NAMES[(self.0 - 1) as usize]
    }

    pub fn all() -> impl Iterator<Item = CalendarMonth> {
        (1..=12).map(CalendarMonth)
    }
}

impl TryFrom<u32> for CalendarMonth {
    type Error = DetectionError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CalendarMonth::new(value)
    }
}

impl From<CalendarMonth> for u32 {
    fn from(month: CalendarMonth) -> Self {
        month.0
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CalendarMonth {
    type Err = DetectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        if let Some(idx) = MONTH_NAMES.iter().position(|name| *name == lowered) {
            return Ok(Self(idx as u32 + 1));
        }
        match lowered.parse::<u32>() {
            Ok(n) => CalendarMonth::new(n),
            Err(_) => Err(DetectionError::InvalidMonth(0)),
        }
    }
}

/// Which trained artifact answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelScope {
    Month(CalendarMonth),
    /// Composite model trained across all months, used only as an explicit fallback.
    Generic,
}

impl ModelScope {
    /// Prefix used for persisted artifact file names.
    pub fn file_stem(&self) -> &'static str {
        match self {
            ModelScope::Month(m) => m.name(),
            ModelScope::Generic => "generic",
        }
    }

    pub fn model_type(&self) -> &'static str {
        match self {
            ModelScope::Month(_) => "month_specific",
            ModelScope::Generic => "generic",
        }
    }

    pub fn month(&self) -> Option<CalendarMonth> {
        match self {
            ModelScope::Month(m) => Some(*m),
            ModelScope::Generic => None,
        }
    }
}

impl fmt::Display for ModelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// Ordinal severity tier. Variant order is the tier order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Buckets a model confidence (0-100). Non-anomalous points are always `Normal`.
    pub fn from_confidence(is_anomaly: bool, confidence: f64) -> Self {
        if !is_anomaly {
            Severity::Normal
        } else if confidence > 80.0 {
            Severity::Critical
        } else if confidence > 60.0 {
            Severity::High
        } else {
            Severity::Medium
        }
    }

    /// Buckets a deviation expressed in standard deviations (baseline classifier).
    pub fn from_deviation_std(deviation: f64) -> Self {
        let abs = deviation.abs();
        if abs > 3.0 {
            Severity::Critical
        } else if abs > 2.5 {
            Severity::High
        } else if abs > 2.0 {
            Severity::Medium
        } else {
            Severity::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored forecast point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionPoint {
    pub timestamp: Timestamp,
    pub value: f64,
    pub is_anomaly: bool,
    /// Raw scorer output in [-1, 0]; lower is more anomalous.
    pub anomaly_score: f64,
    /// `clip(|anomaly_score| * 100, 0, 100)`.
    pub confidence: f64,
    pub severity: Severity,
}

impl PredictionPoint {
    pub fn from_score(timestamp: Timestamp, value: f64, is_anomaly: bool, anomaly_score: f64) -> Self {
        let confidence = (anomaly_score.abs() * 100.0).clamp(0.0, 100.0);
        Self {
            timestamp,
            value,
            is_anomaly,
            anomaly_score,
            confidence,
            severity: Severity::from_confidence(is_anomaly, confidence),
        }
    }

    /// Clears the anomaly flag. Never sets it.
    pub fn clear_anomaly(&mut self) {
        self.is_anomaly = false;
        self.confidence = 0.0;
        self.severity = Severity::Normal;
    }
}

/// Scored forecast horizon plus summary counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastBatch {
    pub series: SeriesKind,
    pub model_scope: ModelScope,
    /// Month the caller asked for; differs from `model_scope` after a fallback.
    pub model_month: CalendarMonth,
    pub generated_at: DateTime<Utc>,
    pub predictions: Vec<PredictionPoint>,
    pub total_points: usize,
    pub anomalies_detected: usize,
    /// Percentage of flagged points, rounded to two decimals.
    pub anomaly_rate: f64,
}

impl ForecastBatch {
    pub fn new(
        series: SeriesKind,
        model_scope: ModelScope,
        model_month: CalendarMonth,
        predictions: Vec<PredictionPoint>,
    ) -> Self {
        let mut batch = Self {
            series,
            model_scope,
            model_month,
            generated_at: Utc::now(),
            predictions,
            total_points: 0,
            anomalies_detected: 0,
            anomaly_rate: 0.0,
        };
        batch.recount();
        batch
    }

    /// Recomputes summary counts from `predictions`.
    pub fn recount(&mut self) {
        self.total_points = self.predictions.len();
        self.anomalies_detected = self.predictions.iter().filter(|p| p.is_anomaly).count();
        self.anomaly_rate = if self.total_points > 0 {
            let pct = self.anomalies_detected as f64 / self.total_points as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        } else {
            0.0
        };
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &PredictionPoint> {
        self.predictions.iter().filter(|p| p.is_anomaly)
    }

    pub fn forecast_period(&self) -> Option<(Timestamp, Timestamp)> {
        let first = self.predictions.first()?;
        let last = self.predictions.last()?;
        Some((first.timestamp, last.timestamp))
    }
}

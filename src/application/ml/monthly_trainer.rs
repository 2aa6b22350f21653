//! Per-calendar-month model training.
//!
//! Each month gets its own scaler and scorer, fitted only on that month's
//! records from every year in the history. A hot August is therefore never
//! judged against a mild October.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info, warn};

use super::feature_engineering::FeatureEngineer;
use super::isolation_forest::{IsolationForest, IsolationForestParameters};
use super::scaler::StandardScaler;
use super::scorer::OutlierScorer;
use crate::domain::errors::DetectionError;
use crate::domain::ml::feature_registry::FeatureProfile;
use crate::domain::types::{CalendarMonth, ModelScope, SeriesKind, TimeSeriesPoint, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl fmt::Display for TrainingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Summary of the raw values a model was trained on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueSummary {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Trained, immutable anomaly model for one month (or the generic fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyModel {
    pub scope: ModelScope,
    pub series: SeriesKind,
    pub scorer: IsolationForest,
    pub scaler: StandardScaler,
    /// Ordered feature names the scaler and scorer were fitted on.
    pub feature_columns: Vec<String>,
    pub window: usize,
    pub contamination: f64,
    pub trained_at: DateTime<Utc>,
    pub training_period: TrainingPeriod,
    pub n_samples: usize,
    pub n_anomalies_detected: usize,
    pub values: ValueSummary,
}

/// Human-readable metadata document persisted next to each model blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub month: String,
    pub month_number: Option<u32>,
    pub series: SeriesKind,
    pub feature_columns: Vec<String>,
    pub window: usize,
    pub trained_at: DateTime<Utc>,
    pub n_samples: usize,
    pub contamination: f64,
    pub n_anomalies_detected: usize,
    pub training_period: String,
    pub avg_demand: f64,
    pub std_demand: f64,
    pub min_demand: f64,
    pub max_demand: f64,
    pub model_type: String,
}

impl MonthlyModel {
    pub fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            month: self.scope.file_stem().to_string(),
            month_number: self.scope.month().map(|m| m.number()),
            series: self.series,
            feature_columns: self.feature_columns.clone(),
            window: self.window,
            trained_at: self.trained_at,
            n_samples: self.n_samples,
            contamination: self.contamination,
            n_anomalies_detected: self.n_anomalies_detected,
            training_period: self.training_period.to_string(),
            avg_demand: self.values.mean,
            std_demand: self.values.std,
            min_demand: self.values.min,
            max_demand: self.values.max,
            model_type: self.scope.model_type().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub n_samples: usize,
    pub n_anomalies_detected: usize,
    pub contamination: f64,
    pub training_period: String,
}

/// Outcome of training one month, as reported to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrainingResult {
    Success(TrainingSummary),
    InsufficientData { available: usize, required: usize },
    Error { reason: String },
}

impl TrainingResult {
    pub fn from_model(model: &MonthlyModel) -> Self {
        TrainingResult::Success(TrainingSummary {
            n_samples: model.n_samples,
            n_anomalies_detected: model.n_anomalies_detected,
            contamination: model.contamination,
            training_period: model.training_period.to_string(),
        })
    }

    pub fn from_error(err: &DetectionError) -> Self {
        match err {
            DetectionError::InsufficientTrainingData {
                available, required, ..
            } => TrainingResult::InsufficientData {
                available: *available,
                required: *required,
            },
            other => TrainingResult::Error {
                reason: other.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TrainingResult::Success(_))
    }

    pub fn outcome_label(&self) -> &'static str {
        match self {
            TrainingResult::Success(_) => "success",
            TrainingResult::InsufficientData { .. } => "insufficient_data",
            TrainingResult::Error { .. } => "error",
        }
    }
}

/// Trainer settings, one per series.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSettings {
    pub series: SeriesKind,
    pub window: usize,
    pub feature_profile: FeatureProfile,
    pub min_training_samples: usize,
    /// Base scorer parameters; contamination is replaced per scope.
    pub forest: IsolationForestParameters,
    pub contamination: f64,
    pub contamination_overrides: BTreeMap<CalendarMonth, f64>,
    pub generic_contamination: f64,
}

impl TrainerSettings {
    pub fn for_series(series: SeriesKind) -> Self {
        Self {
            series,
            window: series.default_window(),
            feature_profile: FeatureProfile::default(),
            min_training_samples: 100,
            forest: IsolationForestParameters::default(),
            contamination: 0.02,
            contamination_overrides: BTreeMap::new(),
            generic_contamination: 0.20,
        }
    }

    pub fn contamination_for(&self, scope: ModelScope) -> f64 {
        match scope {
            ModelScope::Month(m) => self
                .contamination_overrides
                .get(&m)
                .copied()
                .unwrap_or(self.contamination),
            ModelScope::Generic => self.generic_contamination,
        }
    }
}

pub struct MonthlyModelTrainer {
    settings: TrainerSettings,
    engineer: FeatureEngineer,
}

impl MonthlyModelTrainer {
    pub fn new(settings: TrainerSettings) -> Self {
        let engineer = FeatureEngineer::new(settings.series, settings.window);
        Self { settings, engineer }
    }

    pub fn settings(&self) -> &TrainerSettings {
        &self.settings
    }

    /// Trains the model for `month` from every matching record in `history`.
    pub fn train(
        &self,
        month: CalendarMonth,
        history: &[TimeSeriesPoint],
    ) -> Result<MonthlyModel, DetectionError> {
        let slice: Vec<TimeSeriesPoint> = history
            .iter()
            .filter(|p| CalendarMonth::of(&p.timestamp) == month)
            .copied()
            .collect();
        self.fit_scope(ModelScope::Month(month), slice)
    }

    /// Trains the composite model across all months.
    pub fn train_generic(&self, history: &[TimeSeriesPoint]) -> Result<MonthlyModel, DetectionError> {
        self.fit_scope(ModelScope::Generic, history.to_vec())
    }

    /// Trains all twelve months in parallel. Months share no state.
    pub fn train_all(
        &self,
        history: &[TimeSeriesPoint],
    ) -> BTreeMap<CalendarMonth, Result<MonthlyModel, DetectionError>> {
        let months: Vec<CalendarMonth> = CalendarMonth::all().collect();
        months
            .into_par_iter()
            .map(|month| {
                let outcome = self.train(month, history);
                if let Err(e) = &outcome {
                    match e {
                        DetectionError::InsufficientTrainingData { .. } => warn!("{}", e),
                        _ => error!("Error training {} model: {}", month, e),
                    }
                }
                (month, outcome)
            })
            .collect()
    }

    fn fit_scope(
        &self,
        scope: ModelScope,
        mut slice: Vec<TimeSeriesPoint>,
    ) -> Result<MonthlyModel, DetectionError> {
        let required = self.settings.min_training_samples;
        if slice.len() < required {
            return Err(DetectionError::insufficient_training(
                scope.month(),
                slice.len(),
                required,
            ));
        }

        // Stable sort keeps store order for identical timestamps
        slice.sort_by_key(|p| p.timestamp);

        let feature_columns = self
            .settings
            .feature_profile
            .columns(self.settings.series.target_name());
        // A month slice joins several years; engineer each unbroken run alone
        let table = self
            .engineer
            .engineer_contiguous(&slice, self.settings.series.cadence());
        let x = table
            .select(&feature_columns)
            .map_err(|missing| DetectionError::SchemaMismatch {
                model_scope: scope.to_string(),
                missing,
            })?;

        let contamination = self.settings.contamination_for(scope);
        info!(
            "Training {} {} model on {} samples with {} features (contamination={})",
            scope,
            self.settings.series,
            x.nrows(),
            feature_columns.len(),
            contamination
        );

        let (scaler, x_scaled) = StandardScaler::fit_transform(&x);
        let params = self.settings.forest.clone().with_contamination(contamination);
        let scorer = IsolationForest::fit(&x_scaled, params)?;

        let scores = scorer.score_samples(&x_scaled);
        let offset = scorer.offset();
        let n_anomalies_detected = scores.iter().filter(|&&s| s < offset).count();

        let values: Vec<f64> = slice.iter().map(|p| p.value).collect();
        let summary = ValueSummary {
            mean: Statistics::mean(values.iter()),
            std: Statistics::std_dev(values.iter()),
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        };

        let training_period = TrainingPeriod {
            start: slice[0].timestamp,
            end: slice[slice.len() - 1].timestamp,
        };

        info!(
            "{} model trained: {} anomalies on training set ({:.1}%), score range {:.3} to {:.3}",
            scope,
            n_anomalies_detected,
            n_anomalies_detected as f64 / scores.len() as f64 * 100.0,
            scores.iter().copied().fold(f64::INFINITY, f64::min),
            scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        );

        Ok(MonthlyModel {
            scope,
            series: self.settings.series,
            scorer,
            scaler,
            feature_columns,
            window: self.settings.window,
            contamination,
            trained_at: Utc::now(),
            training_period,
            n_samples: slice.len(),
            n_anomalies_detected,
            values: summary,
        })
    }
}

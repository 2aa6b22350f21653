//! Scores a forecast horizon against the season-appropriate model.
//!
//! The historical tail is stitched in front of the forecast before feature
//! engineering so that rolling statistics at the start of the horizon are
//! computed over real history. Only the forecast rows are scored.

use chrono::TimeDelta;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::feature_engineering::FeatureEngineer;
use super::model_registry::ModelRegistry;
use super::scorer::OutlierScorer;
use crate::application::suppression::BaselineSuppressor;
use crate::domain::baseline::BaselineProfile;
use crate::domain::errors::DetectionError;
use crate::domain::types::{CalendarMonth, ForecastBatch, PredictionPoint, TimeSeriesPoint};
use crate::infrastructure::observability::Metrics;

#[derive(Debug, Clone, Default)]
pub struct FutureAnomalyPredictor {
    suppressor: Option<BaselineSuppressor>,
}

impl FutureAnomalyPredictor {
    pub fn new(suppressor: Option<BaselineSuppressor>) -> Self {
        Self { suppressor }
    }

    pub fn suppressor(&self) -> Option<&BaselineSuppressor> {
        self.suppressor.as_ref()
    }

    /// Scores `forecast` using `historical_tail` as rolling-window context.
    ///
    /// Both slices must be sorted ascending with the tail strictly before the
    /// forecast. Model lookup follows the registry's fallback policy.
    pub fn predict(
        &self,
        forecast: &[TimeSeriesPoint],
        historical_tail: &[TimeSeriesPoint],
        target_month: CalendarMonth,
        registry: &ModelRegistry,
        baseline: Option<&BaselineProfile>,
        metrics: Option<&Metrics>,
    ) -> Result<ForecastBatch, DetectionError> {
        let started = Instant::now();
        let series = registry.series();

        if forecast.is_empty() {
            return Err(DetectionError::InsufficientData {
                context: format!("{} forecast horizon", series),
                available: 0,
                required: 1,
            });
        }

        let resolved = registry.resolve(target_month)?;
        let model = resolved.model;
        if resolved.fell_back
            && let Some(m) = metrics
        {
            m.inc_fallbacks(series.as_str());
        }

        validate_alignment(historical_tail, forecast, model.window, series.cadence())?;

        let mut combined = Vec::with_capacity(historical_tail.len() + forecast.len());
        combined.extend_from_slice(historical_tail);
        combined.extend_from_slice(forecast);
        info!(
            "Combined {} historical + {} forecast {} points",
            historical_tail.len(),
            forecast.len(),
            series
        );

        let engineer = FeatureEngineer::new(series, model.window);
        let table = engineer.engineer(&combined).slice_from(historical_tail.len());

        let x = table
            .select(&model.feature_columns)
            .map_err(|missing| DetectionError::SchemaMismatch {
                model_scope: model.scope.to_string(),
                missing,
            })?;
        let x_scaled = model.scaler.transform(&x);

        info!("Scoring {} forecast with the {} model", series, model.scope);
        let scores = model.scorer.score_samples(&x_scaled);
        let offset = model.scorer.offset();

        let predictions: Vec<PredictionPoint> = table
            .timestamps()
            .iter()
            .zip(table.values())
            .zip(&scores)
            .map(|((ts, value), score)| PredictionPoint::from_score(*ts, *value, *score < offset, *score))
            .collect();

        let mut batch = ForecastBatch::new(series, model.scope, target_month, predictions);
        let model_anomalies = batch.anomalies_detected;

        match (&self.suppressor, baseline) {
            (Some(suppressor), Some(profile)) => {
                let report = suppressor.apply(&mut batch, profile);
                if let Some(m) = metrics {
                    m.inc_suppressed(series.as_str(), report.suppressed());
                }
            }
            (Some(_), None) => {
                warn!("No baseline profile available, using model flags without baseline suppression")
            }
            (None, _) => debug!("Baseline suppression disabled"),
        }

        log_summary(&batch);

        if let Some(m) = metrics {
            m.inc_predictions(series.as_str(), batch.total_points);
            m.inc_anomalies(series.as_str(), "model", model_anomalies);
            m.inc_anomalies(series.as_str(), "final", batch.anomalies_detected);
            m.observe_prediction_duration(series.as_str(), started.elapsed().as_secs_f64());
        }

        Ok(batch)
    }
}

/// Checks that the tail can serve as rolling-window context for the forecast.
pub fn validate_alignment(
    historical_tail: &[TimeSeriesPoint],
    forecast: &[TimeSeriesPoint],
    window: usize,
    cadence: TimeDelta,
) -> Result<(), DetectionError> {
    ensure_ascending(historical_tail, "historical tail")?;
    ensure_ascending(forecast, "forecast")?;

    if historical_tail.len() < window {
        return Err(DetectionError::InsufficientData {
            context: "historical tail for rolling features".to_string(),
            available: historical_tail.len(),
            required: window,
        });
    }

    let (Some(last_hist), Some(first_fc)) = (historical_tail.last(), forecast.first()) else {
        return Ok(());
    };

    if last_hist.timestamp >= first_fc.timestamp {
        return Err(DetectionError::TimestampAlignment {
            reason: format!(
                "historical tail ends at {} but forecast starts at {} (overlap)",
                last_hist.timestamp, first_fc.timestamp
            ),
        });
    }

    let max_gap = cadence * window as i32;
    let gap = first_fc.timestamp - last_hist.timestamp;
    if gap > max_gap {
        return Err(DetectionError::TimestampAlignment {
            reason: format!(
                "gap of {} minutes between tail and forecast exceeds the {}-minute feature window",
                gap.num_minutes(),
                max_gap.num_minutes()
            ),
        });
    }

    Ok(())
}

fn ensure_ascending(points: &[TimeSeriesPoint], label: &str) -> Result<(), DetectionError> {
    match points
        .windows(2)
        .find(|pair| pair[0].timestamp >= pair[1].timestamp)
    {
        Some(pair) => Err(DetectionError::TimestampAlignment {
            reason: format!(
                "{} is not strictly ascending ({} followed by {})",
                label, pair[0].timestamp, pair[1].timestamp
            ),
        }),
        None => Ok(()),
    }
}

fn log_summary(batch: &ForecastBatch) {
    info!(
        "Prediction complete: {} points, {} anomalies ({:.1}%)",
        batch.total_points, batch.anomalies_detected, batch.anomaly_rate
    );
    if batch.anomalies_detected > 0 {
        let mut breakdown: BTreeMap<_, usize> = BTreeMap::new();
        for p in batch.anomalies() {
            *breakdown.entry(p.severity).or_default() += 1;
        }
        for (severity, count) in breakdown.iter().rev() {
            info!("   {}: {}", severity, count);
        }
    }
}

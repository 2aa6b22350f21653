//! Prediction archive for dashboard integration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

use super::write_json;
use crate::domain::errors::DetectionError;
use crate::domain::types::{ForecastBatch, SeriesKind};

/// Serialized prediction output. Each point carries its value under the
/// series' target name (`demand_mw` or `price`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDocument {
    pub generated_at: DateTime<Utc>,
    pub model_type: String,
    pub model_month: String,
    pub forecast_period: String,
    pub total_points: usize,
    pub anomalies_detected: usize,
    pub anomaly_rate: f64,
    pub predictions: Vec<Map<String, Value>>,
}

impl PredictionDocument {
    pub fn from_batch(batch: &ForecastBatch) -> Self {
        let forecast_period = batch
            .forecast_period()
            .map(|(start, end)| format!("{} to {}", start.to_rfc3339(), end.to_rfc3339()))
            .unwrap_or_default();

        let predictions = batch
            .predictions
            .iter()
            .map(|p| {
                let mut point = Map::new();
                point.insert("timestamp".into(), Value::from(p.timestamp.to_rfc3339()));
                point.insert(batch.series.target_name().into(), Value::from(p.value));
                point.insert("is_anomaly".into(), Value::from(p.is_anomaly));
                point.insert("anomaly_score".into(), Value::from(p.anomaly_score));
                point.insert("severity".into(), Value::from(p.severity.as_str()));
                point.insert("confidence".into(), Value::from(p.confidence));
                point
            })
            .collect();

        Self {
            generated_at: batch.generated_at,
            model_type: batch.model_scope.model_type().to_string(),
            model_month: batch.model_month.name().to_string(),
            forecast_period,
            total_points: batch.total_points,
            anomalies_detected: batch.anomalies_detected,
            anomaly_rate: batch.anomaly_rate,
            predictions,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionWriter {
    dir: PathBuf,
}

impl PredictionWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self, series: SeriesKind) -> PathBuf {
        self.dir.join(format!("latest_{}_predictions.json", series))
    }

    /// Writes `{month}_{series}_predictions.json` and refreshes the latest copy.
    pub fn write(&self, batch: &ForecastBatch) -> Result<Vec<PathBuf>, DetectionError> {
        let doc = PredictionDocument::from_batch(batch);
        let month_path = self.dir.join(format!(
            "{}_{}_predictions.json",
            batch.model_month.name(),
            batch.series
        ));
        let latest_path = self.latest_path(batch.series);

        write_json(&month_path, &doc)?;
        write_json(&latest_path, &doc)?;
        info!("Predictions saved to {:?}", month_path);
        Ok(vec![month_path, latest_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{CalendarMonth, ModelScope, PredictionPoint};
    use chrono::{FixedOffset, TimeZone};

    fn batch() -> ForecastBatch {
        let tz = FixedOffset::west_opt(8 * 3600).unwrap();
        ForecastBatch::new(
            SeriesKind::Demand,
            ModelScope::Generic,
            CalendarMonth::new(11).unwrap(),
            vec![
                PredictionPoint::from_score(tz.with_ymd_and_hms(2025, 11, 3, 17, 0, 0).unwrap(), 2500.0, false, -0.4),
                PredictionPoint::from_score(tz.with_ymd_and_hms(2025, 11, 3, 18, 0, 0).unwrap(), 3850.0, true, -0.82),
            ],
        )
    }

    #[test]
    fn test_document_layout() {
        let doc = PredictionDocument::from_batch(&batch());
        assert_eq!(doc.model_type, "generic");
        assert_eq!(doc.model_month, "november");
        assert_eq!(doc.anomaly_rate, 50.0);
        assert_eq!(
            doc.forecast_period,
            "2025-11-03T17:00:00-08:00 to 2025-11-03T18:00:00-08:00"
        );
        assert_eq!(doc.predictions[1]["demand_mw"], Value::from(3850.0));
        assert_eq!(doc.predictions[1]["severity"], Value::from("critical"));
    }

    #[test]
    fn test_writes_month_and_latest_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = PredictionWriter::new(dir.path());
        let paths = writer.write(&batch()).unwrap();

        assert_eq!(paths.len(), 2);
        assert!(dir.path().join("november_demand_predictions.json").exists());
        let content = std::fs::read_to_string(writer.latest_path(SeriesKind::Demand)).unwrap();
        let doc: PredictionDocument = serde_json::from_str(&content).unwrap();
        assert_eq!(doc.total_points, 2);
        assert_eq!(doc.anomalies_detected, 1);
    }
}

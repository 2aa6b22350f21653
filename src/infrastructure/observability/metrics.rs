//! Prometheus metrics definitions for gridsentry
//!
//! All metrics use the `gridsentry_` prefix.

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics for the detection pipeline
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Forecast points scored, by series
    pub predictions_total: CounterVec,
    /// Anomalies by series and stage (`model` before suppression, `final` after)
    pub anomalies_total: CounterVec,
    /// Flags cleared by the baseline suppression pass
    pub suppressed_total: CounterVec,
    /// Per-month training runs by outcome
    pub training_runs_total: CounterVec,
    /// Wall time of one predict call
    pub prediction_duration_seconds: HistogramVec,
    /// Requests answered by the generic model
    pub model_fallbacks_total: CounterVec,
}

impl Metrics {
    /// Create a new Metrics instance with all counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new("gridsentry_predictions_total", "Total forecast points scored"),
            &["series"],
        )?;
        registry.register(Box::new(predictions_total.clone()))?;

        let anomalies_total = CounterVec::new(
            Opts::new("gridsentry_anomalies_total", "Total anomalies flagged"),
            &["series", "stage"],
        )?;
        registry.register(Box::new(anomalies_total.clone()))?;

        let suppressed_total = CounterVec::new(
            Opts::new(
                "gridsentry_suppressed_total",
                "Anomaly flags cleared by baseline suppression",
            ),
            &["series"],
        )?;
        registry.register(Box::new(suppressed_total.clone()))?;

        let training_runs_total = CounterVec::new(
            Opts::new("gridsentry_training_runs_total", "Monthly training runs"),
            &["outcome"],
        )?;
        registry.register(Box::new(training_runs_total.clone()))?;

        let prediction_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "gridsentry_prediction_duration_seconds",
                "Forecast scoring latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            &["series"],
        )?;
        registry.register(Box::new(prediction_duration_seconds.clone()))?;

        let model_fallbacks_total = CounterVec::new(
            Opts::new(
                "gridsentry_model_fallbacks_total",
                "Predictions served by the generic model",
            ),
            &["series"],
        )?;
        registry.register(Box::new(model_fallbacks_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            anomalies_total,
            suppressed_total,
            training_runs_total,
            prediction_duration_seconds,
            model_fallbacks_total,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_predictions(&self, series: &str, points: usize) {
        self.predictions_total
            .with_label_values(&[series])
            .inc_by(points as f64);
    }

    pub fn inc_anomalies(&self, series: &str, stage: &str, count: usize) {
        self.anomalies_total
            .with_label_values(&[series, stage])
            .inc_by(count as f64);
    }

    pub fn inc_suppressed(&self, series: &str, count: usize) {
        self.suppressed_total
            .with_label_values(&[series])
            .inc_by(count as f64);
    }

    pub fn inc_training_runs(&self, outcome: &str) {
        self.training_runs_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_prediction_duration(&self, series: &str, seconds: f64) {
        self.prediction_duration_seconds
            .with_label_values(&[series])
            .observe(seconds);
    }

    pub fn inc_fallbacks(&self, series: &str) {
        self.model_fallbacks_total.with_label_values(&[series]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_training_runs("success");
        assert!(metrics.render().contains("gridsentry_"));
    }

    #[test]
    fn test_anomaly_counters_by_stage() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_anomalies("demand", "model", 3);
        metrics.inc_anomalies("demand", "final", 1);
        let output = metrics.render();
        assert!(output.contains("gridsentry_anomalies_total"));
        assert!(output.contains("stage=\"model\""));
        assert!(output.contains("stage=\"final\""));
    }

    #[test]
    fn test_prediction_counter() {
        let metrics = Metrics::new().expect("Failed to create metrics");
        metrics.inc_predictions("demand", 48);
        let output = metrics.render();
        assert!(output.contains("gridsentry_predictions_total{series=\"demand\"} 48"));
    }
}

//! Entry points exposed to the dashboard/API layer.
//!
//! Wires the collaborators (historical store, forecast source, artifact
//! stores) to the detection core. The model registry is loaded once and
//! replaced wholesale after a retrain; prediction calls work on a snapshot.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::application::baseline_builder::{BaselineProfileBuilder, price_demand_correlation};
use crate::application::ml::future_predictor::FutureAnomalyPredictor;
use crate::application::ml::model_registry::{FallbackPolicy, ModelRegistry};
use crate::application::ml::monthly_trainer::{MonthlyModelTrainer, TrainingResult};
use crate::application::suppression::BaselineSuppressor;
use crate::config::{DetectionEnvConfig, SuppressionEnvConfig};
use crate::domain::baseline::{BaselineProfile, PriceDemandCorrelation};
use crate::domain::errors::DetectionError;
use crate::domain::ports::{ForecastSource, HistoricalStore};
use crate::domain::types::{CalendarMonth, ForecastBatch, ModelScope, SeriesKind};
use crate::infrastructure::artifacts::{BaselineStore, ModelStore, PredictionWriter};
use crate::infrastructure::observability::Metrics;

/// Filesystem locations of the service's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStores {
    pub models: ModelStore,
    pub baselines: BaselineStore,
    /// Prediction archive; `None` skips writing prediction JSON.
    pub predictions: Option<PredictionWriter>,
}

pub struct AnomalyService {
    store: Arc<dyn HistoricalStore>,
    forecast: Arc<dyn ForecastSource>,
    artifacts: ArtifactStores,
    detection: DetectionEnvConfig,
    suppression: SuppressionEnvConfig,
    registry: RwLock<Arc<ModelRegistry>>,
    metrics: Option<Metrics>,
}

impl AnomalyService {
    /// Creates the service and loads whatever models are already persisted.
    pub fn new(
        store: Arc<dyn HistoricalStore>,
        forecast: Arc<dyn ForecastSource>,
        artifacts: ArtifactStores,
        detection: DetectionEnvConfig,
        suppression: SuppressionEnvConfig,
        metrics: Option<Metrics>,
    ) -> Result<Self, DetectionError> {
        let registry = artifacts
            .models
            .load_registry(detection.series, detection.model_fallback)?;
        Ok(Self {
            store,
            forecast,
            artifacts,
            detection,
            suppression,
            registry: RwLock::new(Arc::new(registry)),
            metrics,
        })
    }

    pub fn series(&self) -> SeriesKind {
        self.detection.series
    }

    pub async fn registry(&self) -> Arc<ModelRegistry> {
        self.registry.read().await.clone()
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Trains and persists one model per calendar month (plus the generic
    /// model under the generic fallback policy), then swaps in the new registry.
    pub async fn train_all_months(&self) -> Result<BTreeMap<CalendarMonth, TrainingResult>, DetectionError> {
        let series = self.series();
        let history = self.store.query_all(series).await?;
        info!("Training {} models on {} historical points", series, history.len());

        let trainer = Arc::new(MonthlyModelTrainer::new(self.detection.trainer_settings()));
        let history = Arc::new(history);

        let outcomes = {
            let trainer = trainer.clone();
            let history = history.clone();
            tokio::task::spawn_blocking(move || trainer.train_all(&history))
                .await
                .map_err(|e| DetectionError::Collaborator(anyhow::anyhow!("Training task failed: {}", e)))?
        };

        let mut registry = ModelRegistry::new(series, self.detection.model_fallback);
        let mut results = BTreeMap::new();
        for (month, outcome) in outcomes {
            let result = match outcome.and_then(|model| {
                self.artifacts.models.save(&model)?;
                let result = TrainingResult::from_model(&model);
                registry.register(model)?;
                Ok(result)
            }) {
                Ok(result) => result,
                Err(e) => TrainingResult::from_error(&e),
            };
            if let Some(m) = &self.metrics {
                m.inc_training_runs(result.outcome_label());
            }
            results.insert(month, result);
        }

        if self.detection.model_fallback == FallbackPolicy::Generic {
            let trainer = trainer.clone();
            let history = history.clone();
            let generic = tokio::task::spawn_blocking(move || trainer.train_generic(&history))
                .await
                .map_err(|e| DetectionError::Collaborator(anyhow::anyhow!("Training task failed: {}", e)))?;
            match generic {
                Ok(model) => {
                    self.artifacts.models.save(&model)?;
                    registry.register(model)?;
                }
                Err(e) => error!("Generic {} model not trained: {}", series, e),
            }
        }

        let trained = results.values().filter(|r| r.is_success()).count();
        info!("Trained {}/12 {} month models", trained, series);
        if trained < 12 {
            warn!(
                "Months without a model: {:?}",
                results
                    .iter()
                    .filter(|(_, r)| !r.is_success())
                    .map(|(m, _)| m.name())
                    .collect::<Vec<_>>()
            );
        }

        *self.registry.write().await = Arc::new(registry);
        Ok(results)
    }

    /// Builds and persists the all-data baseline and one baseline per month with data.
    pub async fn build_baselines(&self) -> Result<BaselineProfile, DetectionError> {
        let series = self.series();
        let history = self.store.query_all(series).await?;
        let builder = BaselineProfileBuilder::new(series);

        let overall = builder.build(&history)?;
        self.artifacts.baselines.save(&overall)?;
        for profile in builder.build_monthly(&history).values() {
            self.artifacts.baselines.save(profile)?;
        }
        Ok(overall)
    }

    /// Correlates stored price and demand history and persists the result.
    /// `None` when either series is missing or the two never overlap.
    pub async fn build_correlation(&self) -> Result<Option<PriceDemandCorrelation>, DetectionError> {
        let prices = self.store.query_all(SeriesKind::Price).await?;
        let demand = self.store.query_all(SeriesKind::Demand).await?;
        if prices.is_empty() || demand.is_empty() {
            info!(
                "Skipping price-demand correlation ({} price, {} demand points stored)",
                prices.len(),
                demand.len()
            );
            return Ok(None);
        }

        let correlation = price_demand_correlation(&prices, &demand);
        if let Some(c) = &correlation {
            self.artifacts.baselines.save_correlation(c)?;
        }
        Ok(correlation)
    }

    /// Scores the forecast for the `hours_ahead` hours after `as_of`.
    pub async fn predict_future(
        &self,
        hours_ahead: u32,
        as_of: DateTime<Utc>,
    ) -> Result<ForecastBatch, DetectionError> {
        let series = self.series();
        let forecast = self.forecast.query_forecast(as_of, hours_ahead).await?;
        info!(
            "Fetched {} {} forecast points from {}",
            forecast.len(),
            series,
            self.forecast.name()
        );

        let expected = TimeDelta::hours(i64::from(hours_ahead)).num_seconds() / series.cadence().num_seconds();
        if !forecast.is_empty() && (forecast.len() as i64) < expected {
            warn!(
                "{} forecast from {} covers {} of {} expected points after {}",
                series,
                self.forecast.name(),
                forecast.len(),
                expected,
                as_of
            );
        }

        let Some(first) = forecast.first() else {
            return Err(DetectionError::InsufficientData {
                context: format!("{} forecast after {}", series, as_of),
                available: 0,
                required: 1,
            });
        };

        // Month in the forecast's own offset, so local calendar boundaries hold
        let target_month = CalendarMonth::of(&as_of.with_timezone(first.timestamp.offset()));

        let tail = self
            .store
            .latest_before(series, first.timestamp, self.detection.history_tail_points())
            .await?;

        let baseline = if self.suppression.enabled {
            let profile = self.artifacts.baselines.load_for_month(series, target_month)?;
            if profile.is_none() {
                warn!("No {} baseline profile found in {:?}", series, self.artifacts.baselines.dir());
            }
            profile
        } else {
            None
        };

        let suppressor = self
            .suppression
            .enabled
            .then(|| BaselineSuppressor::new(self.suppression.thresholds));
        let predictor = FutureAnomalyPredictor::new(suppressor);
        let registry = self.registry().await;

        let batch = predictor.predict(
            &forecast,
            &tail,
            target_month,
            &registry,
            baseline.as_ref(),
            self.metrics.as_ref(),
        )?;

        if batch.model_scope == ModelScope::Generic {
            info!("{} forecast for {} scored by the generic model", series, target_month);
        }

        if let Some(writer) = &self.artifacts.predictions {
            writer.write(&batch)?;
        }
        Ok(batch)
    }
}

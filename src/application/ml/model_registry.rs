//! Immutable repository of trained models, keyed by scope.
//!
//! Built once (from training output or persisted artifacts), then shared
//! read-only behind an `Arc` by every prediction call.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use super::monthly_trainer::MonthlyModel;
use super::scorer::OutlierScorer;
use crate::domain::errors::DetectionError;
use crate::domain::ml::feature_registry::engineered_feature_names;
use crate::domain::types::{CalendarMonth, ModelScope, SeriesKind};

/// What to do when the requested month has no trained model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    #[default]
    Fail,
    Generic,
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Fail => write!(f, "fail"),
            FallbackPolicy::Generic => write!(f, "generic"),
        }
    }
}

impl FromStr for FallbackPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(FallbackPolicy::Fail),
            "generic" => Ok(FallbackPolicy::Generic),
            _ => anyhow::bail!("Unknown fallback policy: {} (expected fail|generic)", s),
        }
    }
}

/// The model that answers a request, and whether it was a fallback.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedModel<'a> {
    pub model: &'a MonthlyModel,
    pub requested: CalendarMonth,
    pub fell_back: bool,
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    series: SeriesKind,
    fallback: FallbackPolicy,
    models: BTreeMap<ModelScope, MonthlyModel>,
}

impl ModelRegistry {
    pub fn new(series: SeriesKind, fallback: FallbackPolicy) -> Self {
        Self {
            series,
            fallback,
            models: BTreeMap::new(),
        }
    }

    /// Adds a model after checking it against the current feature schema.
    /// A model for the same scope replaces the previous one wholesale.
    pub fn register(&mut self, model: MonthlyModel) -> Result<(), DetectionError> {
        Self::check_schema(self.series, &model)?;
        self.models.insert(model.scope, model);
        Ok(())
    }

    pub fn with_model(mut self, model: MonthlyModel) -> Result<Self, DetectionError> {
        self.register(model)?;
        Ok(self)
    }

    /// Verifies that a persisted model can still be fed by the feature engineer.
    pub fn check_schema(series: SeriesKind, model: &MonthlyModel) -> Result<(), DetectionError> {
        let produced = engineered_feature_names(series.target_name());
        let missing: Vec<String> = model
            .feature_columns
            .iter()
            .filter(|c| !produced.contains(c))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DetectionError::SchemaMismatch {
                model_scope: model.scope.to_string(),
                missing,
            });
        }

        let expected = model.feature_columns.len();
        if model.series != series
            || model.scaler.n_features() != expected
            || model.scorer.n_features() != expected
        {
            return Err(DetectionError::SchemaMismatch {
                model_scope: model.scope.to_string(),
                missing: vec![format!(
                    "{} model with {} columns, scaler width {}, scorer width {}",
                    model.series,
                    expected,
                    model.scaler.n_features(),
                    model.scorer.n_features()
                )],
            });
        }
        Ok(())
    }

    pub fn series(&self) -> SeriesKind {
        self.series
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback
    }

    pub fn get(&self, scope: ModelScope) -> Option<&MonthlyModel> {
        self.models.get(&scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = ModelScope> + '_ {
        self.models.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Finds the model for `month`, applying the fallback policy when absent.
    pub fn resolve(&self, month: CalendarMonth) -> Result<ResolvedModel<'_>, DetectionError> {
        if let Some(model) = self.models.get(&ModelScope::Month(month)) {
            return Ok(ResolvedModel {
                model,
                requested: month,
                fell_back: false,
            });
        }

        match self.fallback {
            FallbackPolicy::Fail => Err(DetectionError::ModelNotFound {
                scope: ModelScope::Month(month),
            }),
            FallbackPolicy::Generic => {
                let model = self.models.get(&ModelScope::Generic).ok_or(
                    DetectionError::ModelNotFound {
                        scope: ModelScope::Generic,
                    },
                )?;
                warn!(
                    "No {} model for {}, falling back to generic model (trained {})",
                    self.series, month, model.trained_at
                );
                Ok(ResolvedModel {
                    model,
                    requested: month,
                    fell_back: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::isolation_forest::IsolationForestParameters;
    use crate::application::ml::monthly_trainer::{MonthlyModelTrainer, TrainerSettings};
    use crate::domain::types::TimeSeriesPoint;
    use chrono::{FixedOffset, TimeDelta, TimeZone};

    fn history(month: u32) -> Vec<TimeSeriesPoint> {
        let start = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, month, 1, 0, 0, 0)
            .unwrap();
        (0..150)
            .map(|i| {
                TimeSeriesPoint::new(
                    start + TimeDelta::hours(i),
                    2000.0 + ((i % 24) as f64) * 20.0,
                )
            })
            .collect()
    }

    fn trainer() -> MonthlyModelTrainer {
        let mut settings = TrainerSettings::for_series(SeriesKind::Demand);
        settings.forest = IsolationForestParameters::default().with_n_estimators(20);
        MonthlyModelTrainer::new(settings)
    }

    #[test]
    fn test_resolve_month_model() {
        let nov = CalendarMonth::new(11).unwrap();
        let model = trainer().train(nov, &history(11)).unwrap();
        let registry = ModelRegistry::new(SeriesKind::Demand, FallbackPolicy::Fail)
            .with_model(model)
            .unwrap();

        let resolved = registry.resolve(nov).unwrap();
        assert!(!resolved.fell_back);
        assert_eq!(resolved.model.scope, ModelScope::Month(nov));
    }

    #[test]
    fn test_missing_model_fails_without_fallback() {
        let registry = ModelRegistry::new(SeriesKind::Demand, FallbackPolicy::Fail);
        let err = registry.resolve(CalendarMonth::new(2).unwrap()).unwrap_err();
        assert_eq!(err.kind(), "model_not_found");
    }

    #[test]
    fn test_generic_fallback_is_flagged() {
        let generic = trainer().train_generic(&history(5)).unwrap();
        let registry = ModelRegistry::new(SeriesKind::Demand, FallbackPolicy::Generic)
            .with_model(generic)
            .unwrap();

        let resolved = registry.resolve(CalendarMonth::new(2).unwrap()).unwrap();
        assert!(resolved.fell_back);
        assert_eq!(resolved.model.scope, ModelScope::Generic);
        assert_eq!(resolved.model.contamination, 0.20);
    }

    #[test]
    fn test_generic_policy_without_generic_model() {
        let registry = ModelRegistry::new(SeriesKind::Demand, FallbackPolicy::Generic);
        match registry.resolve(CalendarMonth::new(2).unwrap()) {
            Err(DetectionError::ModelNotFound { scope }) => assert_eq!(scope, ModelScope::Generic),
            other => panic!("unexpected: {:?}", other.map(|r| r.model.scope)),
        }
    }

    #[test]
    fn test_stale_feature_columns_rejected() {
        let mut model = trainer().train(CalendarMonth::new(11).unwrap(), &history(11)).unwrap();
        model.feature_columns[0] = "temperature_c".to_string();

        let mut registry = ModelRegistry::new(SeriesKind::Demand, FallbackPolicy::Fail);
        match registry.register(model) {
            Err(DetectionError::SchemaMismatch { missing, .. }) => {
                assert_eq!(missing, vec!["temperature_c".to_string()]);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fallback_policy_parsing() {
        assert_eq!("GENERIC".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::Generic);
        assert_eq!("fail".parse::<FallbackPolicy>().unwrap(), FallbackPolicy::Fail);
        assert!("retry".parse::<FallbackPolicy>().is_err());
    }
}

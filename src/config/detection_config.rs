//! Detection configuration parsing from environment variables.
//!
//! Covers the series being monitored, feature engineering, scorer
//! hyperparameters, contamination rates and the missing-model policy.

use anyhow::{Result, anyhow};
use std::collections::BTreeMap;

use super::{Lookup, parse_opt, parse_or};
use crate::application::ml::isolation_forest::IsolationForestParameters;
use crate::application::ml::model_registry::FallbackPolicy;
use crate::application::ml::monthly_trainer::TrainerSettings;
use crate::domain::errors::DetectionError;
use crate::domain::ml::feature_registry::FeatureProfile;
use crate::domain::types::{CalendarMonth, SeriesKind};

/// Detection environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEnvConfig {
    pub series: SeriesKind,
    /// Explicit rolling window; `None` uses the series default.
    pub feature_window: Option<usize>,
    pub feature_profile: FeatureProfile,

    // Contamination
    pub contamination: f64,
    pub contamination_overrides: BTreeMap<CalendarMonth, f64>,
    pub generic_contamination: f64,

    // Training
    pub min_training_samples: usize,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub max_features: f64,
    pub bootstrap: bool,
    pub random_seed: u64,

    // Prediction
    pub model_fallback: FallbackPolicy,
    /// Explicit tail length; `None` uses twice the window.
    pub history_tail_points: Option<usize>,
}

impl Default for DetectionEnvConfig {
    fn default() -> Self {
        let forest = IsolationForestParameters::default();
        Self {
            series: SeriesKind::Demand,
            feature_window: None,
            feature_profile: FeatureProfile::default(),
            contamination: 0.02,
            contamination_overrides: BTreeMap::new(),
            generic_contamination: 0.20,
            min_training_samples: 100,
            n_estimators: forest.n_estimators,
            max_samples: forest.max_samples,
            max_features: forest.max_features,
            bootstrap: forest.bootstrap,
            random_seed: forest.seed,
            model_fallback: FallbackPolicy::Fail,
            history_tail_points: None,
        }
    }
}

impl DetectionEnvConfig {
    pub fn from_source(lookup: Lookup) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            series: parse_or(lookup, "SERIES", defaults.series)?,
            feature_window: parse_opt(lookup, "FEATURE_WINDOW")?,
            feature_profile: parse_or(lookup, "FEATURE_PROFILE", defaults.feature_profile)?,
            contamination: parse_or(lookup, "CONTAMINATION", defaults.contamination)?,
            contamination_overrides: match lookup("CONTAMINATION_OVERRIDES") {
                Some(raw) => Self::parse_overrides(&raw)?,
                None => BTreeMap::new(),
            },
            generic_contamination: parse_or(
                lookup,
                "GENERIC_CONTAMINATION",
                defaults.generic_contamination,
            )?,
            min_training_samples: parse_or(
                lookup,
                "MIN_TRAINING_SAMPLES",
                defaults.min_training_samples,
            )?,
            n_estimators: parse_or(lookup, "N_ESTIMATORS", defaults.n_estimators)?,
            max_samples: parse_or(lookup, "MAX_SAMPLES", defaults.max_samples)?,
            max_features: parse_or(lookup, "MAX_FEATURES", defaults.max_features)?,
            bootstrap: parse_or(lookup, "BOOTSTRAP", defaults.bootstrap)?,
            random_seed: parse_or(lookup, "RANDOM_SEED", defaults.random_seed)?,
            model_fallback: parse_or(lookup, "MODEL_FALLBACK", defaults.model_fallback)?,
            history_tail_points: parse_opt(lookup, "HISTORY_TAIL_POINTS")?,
        })
    }

    /// Parses `"7:0.03,8:0.04"`; months may be numbers or names.
    fn parse_overrides(raw: &str) -> Result<BTreeMap<CalendarMonth, f64>> {
        let mut overrides = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (month, rate) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("Invalid CONTAMINATION_OVERRIDES entry {:?} (expected month:rate)", entry))?;
            let month: CalendarMonth = month.trim().parse()?;
            let rate: f64 = rate
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid contamination rate in {:?}: {}", entry, e))?;
            overrides.insert(month, rate);
        }
        Ok(overrides)
    }

    pub fn window(&self) -> usize {
        self.feature_window.unwrap_or_else(|| self.series.default_window())
    }

    pub fn history_tail_points(&self) -> usize {
        self.history_tail_points.unwrap_or(self.window() * 2)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        let rates = std::iter::once(("CONTAMINATION".to_string(), self.contamination))
            .chain(std::iter::once((
                "GENERIC_CONTAMINATION".to_string(),
                self.generic_contamination,
            )))
            .chain(
                self.contamination_overrides
                    .iter()
                    .map(|(m, r)| (format!("CONTAMINATION_OVERRIDES[{}]", m), *r)),
            );
        for (key, rate) in rates {
            if !(rate > 0.0 && rate <= 0.5) {
                return Err(DetectionError::InvalidConfig {
                    key,
                    reason: format!("{} is outside (0, 0.5]", rate),
                });
            }
        }

        if self.window() == 0 {
            return Err(invalid("FEATURE_WINDOW", "must be at least 1"));
        }
        if self.history_tail_points() < self.window() {
            return Err(invalid(
                "HISTORY_TAIL_POINTS",
                &format!("must cover the {}-point feature window", self.window()),
            ));
        }
        if self.min_training_samples < 2 {
            return Err(invalid("MIN_TRAINING_SAMPLES", "must be at least 2"));
        }
        if self.n_estimators == 0 || self.max_samples < 2 {
            return Err(invalid(
                "N_ESTIMATORS/MAX_SAMPLES",
                "need at least one tree and two samples per tree",
            ));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(invalid("MAX_FEATURES", "must be a fraction in (0, 1]"));
        }
        Ok(())
    }

    pub fn forest_parameters(&self) -> IsolationForestParameters {
        IsolationForestParameters::default()
            .with_n_estimators(self.n_estimators)
            .with_max_samples(self.max_samples)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_contamination(self.contamination)
            .with_seed(self.random_seed)
    }

    pub fn trainer_settings(&self) -> TrainerSettings {
        TrainerSettings {
            series: self.series,
            window: self.window(),
            feature_profile: self.feature_profile,
            min_training_samples: self.min_training_samples,
            forest: self.forest_parameters(),
            contamination: self.contamination,
            contamination_overrides: self.contamination_overrides.clone(),
            generic_contamination: self.generic_contamination,
        }
    }
}

fn invalid(key: &str, reason: &str) -> DetectionError {
    DetectionError::InvalidConfig {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

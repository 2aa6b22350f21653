//! Per-month model artifacts.
//!
//! Each scope is stored as a pair under a month-qualified name:
//! `{month}_{series}_anomaly_detector.json` (scaler + scorer blob) and
//! `{month}_{series}_model_info.json` (metadata document).

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{read_json, write_json};
use crate::application::ml::model_registry::{FallbackPolicy, ModelRegistry};
use crate::application::ml::monthly_trainer::{ModelMetadata, MonthlyModel};
use crate::domain::errors::DetectionError;
use crate::domain::types::{CalendarMonth, ModelScope, SeriesKind};

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn model_path(&self, series: SeriesKind, scope: ModelScope) -> PathBuf {
        self.dir
            .join(format!("{}_{}_anomaly_detector.json", scope.file_stem(), series))
    }

    pub fn metadata_path(&self, series: SeriesKind, scope: ModelScope) -> PathBuf {
        self.dir
            .join(format!("{}_{}_model_info.json", scope.file_stem(), series))
    }

    /// Writes the model pair, replacing any previous artifact for the scope.
    pub fn save(&self, model: &MonthlyModel) -> Result<(), DetectionError> {
        let model_path = self.model_path(model.series, model.scope);
        write_json(&model_path, model)?;
        write_json(&self.metadata_path(model.series, model.scope), &model.metadata())?;
        info!("Saved {} model to {:?}", model.scope, model_path);
        Ok(())
    }

    pub fn load(&self, series: SeriesKind, scope: ModelScope) -> Result<Option<MonthlyModel>, DetectionError> {
        let Some(model) = read_json::<MonthlyModel>(&self.model_path(series, scope))? else {
            return Ok(None);
        };

        if let Some(meta) = read_json::<ModelMetadata>(&self.metadata_path(series, scope))?
            && meta.feature_columns != model.feature_columns
        {
            return Err(DetectionError::SchemaMismatch {
                model_scope: scope.to_string(),
                missing: meta
                    .feature_columns
                    .into_iter()
                    .filter(|c| !model.feature_columns.contains(c))
                    .collect(),
            });
        }
        Ok(Some(model))
    }

    pub fn load_metadata(
        &self,
        series: SeriesKind,
        scope: ModelScope,
    ) -> Result<Option<ModelMetadata>, DetectionError> {
        read_json(&self.metadata_path(series, scope))
    }

    /// Loads every persisted month model plus the generic model, if present.
    pub fn load_registry(
        &self,
        series: SeriesKind,
        fallback: FallbackPolicy,
    ) -> Result<ModelRegistry, DetectionError> {
        let mut registry = ModelRegistry::new(series, fallback);
        let scopes = CalendarMonth::all()
            .map(ModelScope::Month)
            .chain(std::iter::once(ModelScope::Generic));

        for scope in scopes {
            if let Some(model) = self.load(series, scope)? {
                registry.register(model)?;
            }
        }

        if registry.is_empty() {
            warn!("No {} models found in {:?}", series, self.dir);
        } else {
            info!("Loaded {} {} models from {:?}", registry.len(), series, self.dir);
        }
        Ok(registry)
    }
}

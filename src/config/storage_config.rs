//! Storage configuration parsing from environment variables.

use std::path::PathBuf;

use super::Lookup;

/// Storage environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEnvConfig {
    pub database_url: String,
    pub models_dir: PathBuf,
    pub baseline_dir: PathBuf,
    pub predictions_dir: PathBuf,
    /// CSV file used as the forecast source, if any.
    pub forecast_csv: Option<PathBuf>,
}

impl Default for StorageEnvConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://data/gridsentry.db".to_string(),
            models_dir: PathBuf::from("data/models"),
            baseline_dir: PathBuf::from("data/baselines"),
            predictions_dir: PathBuf::from("data/predictions"),
            forecast_csv: None,
        }
    }
}

impl StorageEnvConfig {
    pub fn from_source(lookup: Lookup) -> Self {
        let defaults = Self::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            models_dir: lookup("MODELS_DIR").map(PathBuf::from).unwrap_or(defaults.models_dir),
            baseline_dir: lookup("BASELINE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.baseline_dir),
            predictions_dir: lookup("PREDICTIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.predictions_dir),
            forecast_csv: lookup("FORECAST_CSV").map(PathBuf::from),
        }
    }
}

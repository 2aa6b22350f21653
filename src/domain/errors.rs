use std::path::PathBuf;
use thiserror::Error;

use crate::domain::types::{CalendarMonth, ModelScope};

/// Errors raised by the detection pipeline.
///
/// Every variant carries enough context for a caller to render a specific
/// message; none of them is retried inside the core.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Insufficient data for {context}: {available} points available, {required} required")]
    InsufficientData {
        context: String,
        available: usize,
        required: usize,
    },

    #[error("Insufficient training data for {month}: {available} records, need at least {required}")]
    InsufficientTrainingData {
        month: String,
        available: usize,
        required: usize,
    },

    #[error("No trained model for {scope}")]
    ModelNotFound { scope: ModelScope },

    #[error("Model {model_scope} expects features not produced by the feature engineer: {missing:?} (retrain required)")]
    SchemaMismatch {
        model_scope: String,
        missing: Vec<String>,
    },

    #[error("Historical tail and forecast are not aligned: {reason}")]
    TimestampAlignment { reason: String },

    #[error("Invalid calendar month: {0} (expected 1-12)")]
    InvalidMonth(u32),

    #[error("Invalid configuration for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Artifact I/O failed for {path:?}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Artifact at {path:?} is malformed: {source}")]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl DetectionError {
    pub fn insufficient_training(month: Option<CalendarMonth>, available: usize, required: usize) -> Self {
        DetectionError::InsufficientTrainingData {
            month: month.map(|m| m.name().to_string()).unwrap_or_else(|| "generic".to_string()),
            available,
            required,
        }
    }

    /// Stable machine-readable kind, for API layers that map errors to responses.
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionError::InsufficientData { .. } => "insufficient_data",
            DetectionError::InsufficientTrainingData { .. } => "insufficient_training_data",
            DetectionError::ModelNotFound { .. } => "model_not_found",
            DetectionError::SchemaMismatch { .. } => "schema_mismatch",
            DetectionError::TimestampAlignment { .. } => "timestamp_alignment",
            DetectionError::InvalidMonth(_) => "invalid_month",
            DetectionError::InvalidConfig { .. } => "invalid_config",
            DetectionError::ArtifactIo { .. } => "artifact_io",
            DetectionError::ArtifactFormat { .. } => "artifact_format",
            DetectionError::Collaborator(_) => "collaborator",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_training_formatting() {
        let err = DetectionError::insufficient_training(CalendarMonth::new(2).ok(), 42, 100);
        let msg = err.to_string();
        assert!(msg.contains("february"));
        assert!(msg.contains("42"));
        assert!(msg.contains("100"));
        assert_eq!(err.kind(), "insufficient_training_data");
    }

    #[test]
    fn test_model_not_found_formatting() {
        let month = CalendarMonth::new(7).unwrap();
        let err = DetectionError::ModelNotFound {
            scope: ModelScope::Month(month),
        };
        assert_eq!(err.to_string(), "No trained model for july");
    }

    #[test]
    fn test_collaborator_is_transparent() {
        let err: DetectionError = anyhow::anyhow!("database is locked").into();
        assert_eq!(err.to_string(), "database is locked");
        assert_eq!(err.kind(), "collaborator");
    }
}

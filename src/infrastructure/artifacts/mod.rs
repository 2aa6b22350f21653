//! Filesystem persistence for trained models, baselines and prediction output.
//!
//! Every artifact is a pretty-printed JSON document written atomically
//! (temp file, then rename).

pub mod baseline_store;
pub mod model_store;
pub mod prediction_writer;

pub use baseline_store::BaselineStore;
pub use model_store::ModelStore;
pub use prediction_writer::PredictionWriter;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::domain::errors::DetectionError;

fn io_error(path: &Path, source: std::io::Error) -> DetectionError {
    DetectionError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), DetectionError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let content = serde_json::to_string_pretty(value).map_err(|source| DetectionError::ArtifactFormat {
        path: path.to_path_buf(),
        source,
    })?;

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).map_err(|e| io_error(&temp_path, e))?;
    fs::rename(&temp_path, path).map_err(|e| io_error(path, e))?;
    Ok(())
}

/// Reads a JSON artifact; `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DetectionError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| DetectionError::ArtifactFormat {
            path: path.to_path_buf(),
            source,
        })
}

//! Configuration module for gridsentry.
//!
//! Structured configuration loaded from environment variables, organized by
//! concern: Detection, Suppression and Storage. An optional TOML file adds
//! per-series tuning on top (see [`SeriesConfigFile`]).
//!
//! Every sub-config has a `from_source` constructor taking a key lookup, so
//! tests can supply values without touching the process environment.

mod detection_config;
mod series_config;
mod storage_config;
mod suppression_config;

pub use detection_config::DetectionEnvConfig;
pub use series_config::{SeriesConfigFile, SeriesOverride};
pub use storage_config::StorageEnvConfig;
pub use suppression_config::SuppressionEnvConfig;

use anyhow::{Context, Result, anyhow};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Key lookup used by the `from_source` constructors.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Looks keys up in the process environment.
pub fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Parses `key` when present, otherwise returns `default`.
pub(crate) fn parse_or<T>(lookup: Lookup, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match parse_opt(lookup, key)? {
        Some(v) => Ok(v),
        None => Ok(default),
    }
}

/// Parses `key` when present and non-empty.
pub(crate) fn parse_opt<T>(lookup: Lookup, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Failed to parse {}={:?}: {}", key, raw, e)),
        _ => Ok(None),
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub detection: DetectionEnvConfig,
    pub suppression: SuppressionEnvConfig,
    pub storage: StorageEnvConfig,
}

impl Config {
    /// Loads from the process environment. Call `dotenvy::dotenv()` first to
    /// pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_source(&process_env)
    }

    pub fn from_source(lookup: Lookup) -> Result<Self> {
        let mut detection =
            DetectionEnvConfig::from_source(lookup).context("Failed to load detection config")?;
        let mut suppression = SuppressionEnvConfig::from_source(lookup, detection.series)
            .context("Failed to load suppression config")?;
        let storage = StorageEnvConfig::from_source(lookup);

        if let Some(path) = suppression.series_config_path.clone() {
            let file = SeriesConfigFile::load(&path)?;
            if let Some(overrides) = file.for_series(detection.series) {
                overrides.apply(&mut detection, &mut suppression);
            }
        }

        detection.validate()?;
        suppression.validate()?;

        Ok(Self {
            detection,
            suppression,
            storage,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    /// Builds a lookup over fixed key/value pairs.
    pub fn lookup_from(pairs: &[(&str, &str)]) -> Box<dyn Fn(&str) -> Option<String>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Box::new(move |key: &str| map.get(key).cloned())
    }
}

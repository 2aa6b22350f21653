//! CSV series files (`timestamp,value`, RFC 3339 timestamps with offset).

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::ports::ForecastSource;
use crate::domain::types::TimeSeriesPoint;
use crate::infrastructure::repositories::in_memory::StaticForecastSource;

#[derive(Debug, Deserialize)]
struct SeriesRecord {
    timestamp: String,
    value: f64,
}

/// Reads a series file, returning points sorted ascending by timestamp.
pub fn read_series_csv(path: &Path) -> Result<Vec<TimeSeriesPoint>> {
    let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut rdr = csv::Reader::from_reader(BufReader::new(file));

    let mut points = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let record: SeriesRecord =
            result.with_context(|| format!("Malformed record {} in {:?}", line + 1, path))?;
        let timestamp = DateTime::parse_from_rfc3339(record.timestamp.trim()).with_context(|| {
            format!("Invalid timestamp {:?} in record {}", record.timestamp, line + 1)
        })?;
        points.push(TimeSeriesPoint::new(timestamp, record.value));
    }

    points.sort_by_key(|p| p.timestamp);
    info!("Loaded {} points from {:?}", points.len(), path);
    Ok(points)
}

/// Forecast source backed by a CSV file, re-read on every query so an
/// external process can refresh it between runs.
pub struct CsvForecastSource {
    path: PathBuf,
}

impl CsvForecastSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ForecastSource for CsvForecastSource {
    async fn query_forecast(
        &self,
        after: DateTime<Utc>,
        hours_ahead: u32,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let path = self.path.clone();
        let points = tokio::task::spawn_blocking(move || read_series_csv(&path))
            .await
            .context("Forecast reader task failed")??;
        StaticForecastSource::new(self.name(), points)
            .query_forecast(after, hours_ahead)
            .await
    }

    fn name(&self) -> &str {
        "csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_reads_and_sorts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,value").unwrap();
        writeln!(file, "2025-11-03T01:00:00-08:00,2410.5").unwrap();
        writeln!(file, "2025-11-03T00:00:00-08:00,2380.0").unwrap();

        let points = read_series_csv(file.path()).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].value, 2380.0);
        assert_eq!(points[1].timestamp.offset().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn test_rejects_naive_timestamps() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,value").unwrap();
        writeln!(file, "2025-11-03 01:00:00,2410.5").unwrap();
        assert!(read_series_csv(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_forecast_source_limits_horizon() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timestamp,value").unwrap();
        for h in 0..10 {
            writeln!(file, "2025-11-03T{:02}:00:00-08:00,{}", h, 2000 + h).unwrap();
        }
        let source = CsvForecastSource::new(file.path());

        let as_of = DateTime::parse_from_rfc3339("2025-11-03T05:00:00-08:00").unwrap().with_timezone(&Utc);
        let next = source.query_forecast(as_of, 4).await.unwrap();
        assert_eq!(next.iter().map(|p| p.value).collect::<Vec<_>>(), vec![2006.0, 2007.0, 2008.0, 2009.0]);
    }
}

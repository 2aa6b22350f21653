use std::path::{Path, PathBuf};
use tracing::info;

use super::{read_json, write_json};
use crate::domain::baseline::{BaselineProfile, PriceDemandCorrelation};
use crate::domain::errors::DetectionError;
use crate::domain::types::{CalendarMonth, SeriesKind};

/// Baseline profiles on disk: `{series}_baseline_{month|all}.json`, plus
/// `price_demand_correlation.json`.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, series: SeriesKind, month: Option<CalendarMonth>) -> PathBuf {
        let scope = month.map(|m| m.name()).unwrap_or("all");
        self.dir.join(format!("{}_baseline_{}.json", series, scope))
    }

    pub fn save(&self, profile: &BaselineProfile) -> Result<PathBuf, DetectionError> {
        let path = self.path(profile.series, profile.month);
        write_json(&path, profile)?;
        info!("Saved baseline profile to {:?}", path);
        Ok(path)
    }

    pub fn load(
        &self,
        series: SeriesKind,
        month: Option<CalendarMonth>,
    ) -> Result<Option<BaselineProfile>, DetectionError> {
        read_json(&self.path(series, month))
    }

    pub fn correlation_path(&self) -> PathBuf {
        self.dir.join("price_demand_correlation.json")
    }

    pub fn save_correlation(&self, correlation: &PriceDemandCorrelation) -> Result<PathBuf, DetectionError> {
        let path = self.correlation_path();
        write_json(&path, correlation)?;
        info!("Saved price-demand correlation to {:?}", path);
        Ok(path)
    }

    pub fn load_correlation(&self) -> Result<Option<PriceDemandCorrelation>, DetectionError> {
        read_json(&self.correlation_path())
    }

    /// The month's profile when present, otherwise the all-data profile.
    pub fn load_for_month(
        &self,
        series: SeriesKind,
        month: CalendarMonth,
    ) -> Result<Option<BaselineProfile>, DetectionError> {
        match self.load(series, Some(month))? {
            Some(profile) => Ok(Some(profile)),
            None => self.load(series, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::baseline_builder::BaselineProfileBuilder;
    use crate::domain::types::TimeSeriesPoint;
    use chrono::{FixedOffset, TimeDelta, TimeZone};

    fn points(month: u32) -> Vec<TimeSeriesPoint> {
        let start = FixedOffset::west_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, month, 1, 0, 0, 0)
            .unwrap();
        (0..72)
            .map(|i| TimeSeriesPoint::new(start + TimeDelta::hours(i), 3000.0 + i as f64))
            .collect()
    }

    #[test]
    fn test_month_profile_preferred_over_all_data() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path());
        let builder = BaselineProfileBuilder::new(SeriesKind::Demand);
        let august = CalendarMonth::new(8).unwrap();

        let all = builder.build(&points(3)).unwrap();
        store.save(&all).unwrap();
        assert_eq!(
            store.load_for_month(SeriesKind::Demand, august).unwrap(),
            Some(all.clone())
        );

        let aug = builder.build_for_month(&points(8), august).unwrap();
        store.save(&aug).unwrap();
        assert!(dir.path().join("demand_baseline_august.json").exists());
        assert_eq!(
            store.load_for_month(SeriesKind::Demand, august).unwrap(),
            Some(aug)
        );
    }

    #[test]
    fn test_nothing_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = BaselineStore::new(dir.path());
        assert!(store
            .load_for_month(SeriesKind::Price, CalendarMonth::new(1).unwrap())
            .unwrap()
            .is_none());
    }
}

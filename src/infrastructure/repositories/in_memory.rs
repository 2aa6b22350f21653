//! In-memory collaborator implementations
//!
//! Thread-safe (`Arc<RwLock>`) stand-ins for the historical store and the
//! forecast source. Suitable for tests, demos and one-shot CLI runs where the
//! whole history fits in RAM.

use crate::domain::ports::{ForecastSource, HistoricalStore};
use crate::domain::types::{CalendarMonth, SeriesKind, TimeSeriesPoint, Timestamp};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory historical store, one ascending vector per series.
#[derive(Clone, Default)]
pub struct InMemorySeriesStore {
    series: Arc<RwLock<HashMap<SeriesKind, Vec<TimeSeriesPoint>>>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts points, keeping the series sorted. A point at an instant that
    /// is already stored replaces the stored value.
    pub async fn insert(&self, series: SeriesKind, points: &[TimeSeriesPoint]) -> usize {
        let mut guard = self.series.write().await;
        let stored = guard.entry(series).or_default();
        for point in points {
            match stored.binary_search_by(|p| p.timestamp.cmp(&point.timestamp)) {
                Ok(idx) => stored[idx] = *point,
                Err(idx) => stored.insert(idx, *point),
            }
        }
        stored.len()
    }

    pub async fn len(&self, series: SeriesKind) -> usize {
        self.series.read().await.get(&series).map_or(0, Vec::len)
    }

    async fn filtered<F>(&self, series: SeriesKind, keep: F) -> Vec<TimeSeriesPoint>
    where
        F: Fn(&TimeSeriesPoint) -> bool,
    {
        self.series
            .read()
            .await
            .get(&series)
            .map(|points| points.iter().filter(|p| keep(p)).copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HistoricalStore for InMemorySeriesStore {
    async fn query(
        &self,
        series: SeriesKind,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<TimeSeriesPoint>> {
        Ok(self
            .filtered(series, |p| p.timestamp >= start && p.timestamp < end)
            .await)
    }

    async fn query_month(
        &self,
        series: SeriesKind,
        month: CalendarMonth,
    ) -> Result<Vec<TimeSeriesPoint>> {
        Ok(self
            .filtered(series, |p| CalendarMonth::of(&p.timestamp) == month)
            .await)
    }

    async fn query_all(&self, series: SeriesKind) -> Result<Vec<TimeSeriesPoint>> {
        Ok(self.filtered(series, |_| true).await)
    }

    async fn latest_before(
        &self,
        series: SeriesKind,
        before: Timestamp,
        limit: usize,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let earlier = self.filtered(series, |p| p.timestamp < before).await;
        let skip = earlier.len().saturating_sub(limit);
        Ok(earlier[skip..].to_vec())
    }
}

/// Forecast source over a fixed, pre-loaded horizon.
#[derive(Clone)]
pub struct StaticForecastSource {
    name: String,
    points: Arc<Vec<TimeSeriesPoint>>,
}

impl StaticForecastSource {
    /// `points` are sorted here; the source hands them out in ascending order.
    pub fn new(name: impl Into<String>, mut points: Vec<TimeSeriesPoint>) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            name: name.into(),
            points: Arc::new(points),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[async_trait]
impl ForecastSource for StaticForecastSource {
    async fn query_forecast(
        &self,
        after: DateTime<Utc>,
        hours_ahead: u32,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let horizon_end = after + TimeDelta::hours(i64::from(hours_ahead));
        let start = self.points.partition_point(|p| p.timestamp <= after);
        Ok(self.points[start..]
            .iter()
            .take_while(|p| p.timestamp <= horizon_end)
            .copied()
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(hours: i64) -> Timestamp {
        FixedOffset::west_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 10, 31, 20, 0, 0)
            .unwrap()
            + TimeDelta::hours(hours)
    }

    fn points(range: std::ops::Range<i64>) -> Vec<TimeSeriesPoint> {
        range.map(|i| TimeSeriesPoint::new(at(i), i as f64)).collect()
    }

    #[tokio::test]
    async fn test_insert_sorts_and_replaces() {
        let store = InMemorySeriesStore::new();
        let mut batch = points(0..5);
        batch.reverse();
        store.insert(SeriesKind::Demand, &batch).await;
        store
            .insert(SeriesKind::Demand, &[TimeSeriesPoint::new(at(2), 99.0)])
            .await;

        let all = store.query_all(SeriesKind::Demand).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(all.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(all[2].value, 99.0);
        assert_eq!(store.len(SeriesKind::Price).await, 0);
    }

    #[tokio::test]
    async fn test_queries() {
        let store = InMemorySeriesStore::new();
        store.insert(SeriesKind::Demand, &points(0..10)).await;

        let range = store.query(SeriesKind::Demand, at(2), at(5)).await.unwrap();
        assert_eq!(range.iter().map(|p| p.value).collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);

        // at(0)..at(3) fall on Oct 31 local time
        let nov = store
            .query_month(SeriesKind::Demand, CalendarMonth::new(11).unwrap())
            .await
            .unwrap();
        assert_eq!(nov.len(), 6);

        let tail = store.latest_before(SeriesKind::Demand, at(8), 3).await.unwrap();
        assert_eq!(tail.iter().map(|p| p.value).collect::<Vec<_>>(), vec![5.0, 6.0, 7.0]);
    }

    #[tokio::test]
    async fn test_static_forecast_horizon() {
        let source = StaticForecastSource::new("fixture", points(0..48));
        let next = source.query_forecast(at(-1).with_timezone(&Utc), 30).await.unwrap();
        assert_eq!(next.len(), 30);
        assert_eq!(next[0].timestamp, at(0));
        assert_eq!(source.name(), "fixture");
    }

    #[tokio::test]
    async fn test_forecast_horizon_starts_after_as_of() {
        let source = StaticForecastSource::new("fixture", points(0..48));

        // Half a day into the file: the 30 hours after at(12), not the file start.
        let next = source.query_forecast(at(12).with_timezone(&Utc), 30).await.unwrap();
        assert_eq!(next.len(), 30);
        assert_eq!(next[0].timestamp, at(13));
        assert_eq!(next[29].timestamp, at(42));

        // Runs off the end of the file.
        let short = source.query_forecast(at(40).with_timezone(&Utc), 30).await.unwrap();
        assert_eq!(short.len(), 7);

        let none = source.query_forecast(at(47).with_timezone(&Utc), 30).await.unwrap();
        assert!(none.is_empty());
    }
}

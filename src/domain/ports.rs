//! Collaborator interfaces.
//!
//! The detection core never performs I/O itself: historical and forecast
//! series are resolved through these ports before any feature is computed.

use crate::domain::types::{CalendarMonth, SeriesKind, TimeSeriesPoint, Timestamp};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Queryable historical time series.
///
/// All queries return points sorted ascending by timestamp.
#[async_trait]
pub trait HistoricalStore: Send + Sync {
    /// Points with `start <= timestamp < end`.
    async fn query(
        &self,
        series: SeriesKind,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<TimeSeriesPoint>>;

    /// Every point whose local calendar month equals `month`, across all years.
    async fn query_month(&self, series: SeriesKind, month: CalendarMonth)
    -> Result<Vec<TimeSeriesPoint>>;

    /// The full history of a series.
    async fn query_all(&self, series: SeriesKind) -> Result<Vec<TimeSeriesPoint>>;

    /// The most recent `limit` points strictly before `before`.
    async fn latest_before(
        &self,
        series: SeriesKind,
        before: Timestamp,
        limit: usize,
    ) -> Result<Vec<TimeSeriesPoint>>;
}

/// Externally supplied forecast of a series.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Forecast points with `after < timestamp <= after + hours_ahead`, sorted ascending.
    ///
    /// The horizon is measured from `after`, not from the first point the
    /// source happens to hold.
    async fn query_forecast(
        &self,
        after: DateTime<Utc>,
        hours_ahead: u32,
    ) -> Result<Vec<TimeSeriesPoint>>;

    /// Source name, for logs.
    fn name(&self) -> &str;
}

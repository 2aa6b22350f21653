use crate::domain::ports::HistoricalStore;
use crate::domain::types::{CalendarMonth, SeriesKind, TimeSeriesPoint, Timestamp};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Historical grid series stored in SQLite.
pub struct SqliteSeriesRepository {
    pool: SqlitePool,
}

impl SqliteSeriesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts points in one transaction; an existing instant gets the new value.
    pub async fn insert(&self, series: SeriesKind, points: &[TimeSeriesPoint]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for point in points {
            sqlx::query(
                r#"
                INSERT INTO grid_series (series, epoch, timestamp, local_month, value)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(series, epoch) DO UPDATE SET
                    timestamp = excluded.timestamp,
                    local_month = excluded.local_month,
                    value = excluded.value
                "#,
            )
            .bind(series.as_str())
            .bind(point.timestamp.timestamp())
            .bind(point.timestamp.to_rfc3339())
            .bind(CalendarMonth::of(&point.timestamp).number() as i64)
            .bind(point.value)
            .execute(&mut *tx)
            .await
            .context("Failed to insert grid series point")?;
        }
        tx.commit().await?;

        info!("Persisted {} {} points", points.len(), series);
        Ok(points.len())
    }

    pub async fn count(&self, series: SeriesKind) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM grid_series WHERE series = ?")
            .bind(series.as_str())
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }

    fn map_rows(rows: Vec<sqlx::sqlite::SqliteRow>) -> Result<Vec<TimeSeriesPoint>> {
        rows.into_iter()
            .map(|row| {
                let raw: String = row.try_get("timestamp")?;
                let timestamp = DateTime::parse_from_rfc3339(&raw)
                    .with_context(|| format!("Stored timestamp {:?} is not RFC 3339", raw))?;
                Ok(TimeSeriesPoint::new(timestamp, row.try_get("value")?))
            })
            .collect()
    }
}

#[async_trait]
impl HistoricalStore for SqliteSeriesRepository {
    async fn query(
        &self,
        series: SeriesKind,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let rows = sqlx::query(
            "SELECT timestamp, value FROM grid_series WHERE series = ? AND epoch >= ? AND epoch < ? ORDER BY epoch ASC",
        )
        .bind(series.as_str())
        .bind(start.timestamp())
        .bind(end.timestamp())
        .fetch_all(&self.pool)
        .await?;
        Self::map_rows(rows)
    }

    async fn query_month(
        &self,
        series: SeriesKind,
        month: CalendarMonth,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let rows = sqlx::query(
            "SELECT timestamp, value FROM grid_series WHERE series = ? AND local_month = ? ORDER BY epoch ASC",
        )
        .bind(series.as_str())
        .bind(month.number() as i64)
        .fetch_all(&self.pool)
        .await?;
        Self::map_rows(rows)
    }

    async fn query_all(&self, series: SeriesKind) -> Result<Vec<TimeSeriesPoint>> {
        let rows = sqlx::query(
            "SELECT timestamp, value FROM grid_series WHERE series = ? ORDER BY epoch ASC",
        )
        .bind(series.as_str())
        .fetch_all(&self.pool)
        .await?;
        Self::map_rows(rows)
    }

    async fn latest_before(
        &self,
        series: SeriesKind,
        before: Timestamp,
        limit: usize,
    ) -> Result<Vec<TimeSeriesPoint>> {
        let rows = sqlx::query(
            "SELECT timestamp, value FROM grid_series WHERE series = ? AND epoch < ? ORDER BY epoch DESC LIMIT ?",
        )
        .bind(series.as_str())
        .bind(before.timestamp())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut points = Self::map_rows(rows)?;
        points.reverse();
        Ok(points)
    }
}

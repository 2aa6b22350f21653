//! Builds baseline profiles from a historical "normal" slice.

use chrono::{Datelike, NaiveDate, Timelike, Utc};
use statrs::statistics::{Data, Distribution, Max, Min};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::application::ml::isolation_forest::percentile;
use crate::domain::baseline::{
    BaselineProfile, DAY_NAMES, DataPeriod, PriceDemandCorrelation, SummaryStats,
};
use crate::domain::errors::DetectionError;
use crate::domain::types::{CalendarMonth, SeriesKind, TimeSeriesPoint};

const PEAK_HOURS: usize = 5;

pub struct BaselineProfileBuilder {
    series: SeriesKind,
}

impl BaselineProfileBuilder {
    pub fn new(series: SeriesKind) -> Self {
        Self { series }
    }

    /// Profile over every point given.
    pub fn build(&self, points: &[TimeSeriesPoint]) -> Result<BaselineProfile, DetectionError> {
        self.build_scoped(points, None)
    }

    /// Profile over the points falling in `month`, from any year.
    pub fn build_for_month(
        &self,
        points: &[TimeSeriesPoint],
        month: CalendarMonth,
    ) -> Result<BaselineProfile, DetectionError> {
        let slice: Vec<TimeSeriesPoint> = points
            .iter()
            .filter(|p| CalendarMonth::of(&p.timestamp) == month)
            .copied()
            .collect();
        self.build_scoped(&slice, Some(month))
    }

    /// One profile per month that has data. Empty months are skipped with a warning.
    pub fn build_monthly(&self, points: &[TimeSeriesPoint]) -> BTreeMap<CalendarMonth, BaselineProfile> {
        let mut profiles = BTreeMap::new();
        for month in CalendarMonth::all() {
            match self.build_for_month(points, month) {
                Ok(profile) => {
                    profiles.insert(month, profile);
                }
                Err(e) => warn!("Skipping {} baseline: {}", month, e),
            }
        }
        profiles
    }

    fn build_scoped(
        &self,
        points: &[TimeSeriesPoint],
        month: Option<CalendarMonth>,
    ) -> Result<BaselineProfile, DetectionError> {
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let overall = summarize(&values).ok_or_else(|| DetectionError::InsufficientData {
            context: format!(
                "{} baseline ({})",
                self.series,
                month.map(|m| m.name()).unwrap_or("all months")
            ),
            available: 0,
            required: 1,
        })?;

        let mut by_hour: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut by_day: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
        let mut weekday = Vec::new();
        let mut weekend = Vec::new();
        for p in points {
            let dow = p.timestamp.weekday().num_days_from_monday();
            by_hour.entry(p.timestamp.hour()).or_default().push(p.value);
            by_day.entry(dow).or_default().push(p.value);
            if dow >= 5 {
                weekend.push(p.value);
            } else {
                weekday.push(p.value);
            }
        }

        let hourly: BTreeMap<u32, SummaryStats> = (0..24)
            .map(|h| {
                let stats = by_hour.get(&h).and_then(|v| summarize(v)).unwrap_or(overall);
                (h, stats)
            })
            .collect();

        let day_of_week = by_day
            .iter()
            .filter_map(|(dow, v)| Some((DAY_NAMES[*dow as usize].to_string(), summarize(v)?)))
            .collect();

        let mut ranked: Vec<(u32, f64)> = by_hour
            .keys()
            .map(|h| (*h, hourly[h].mean))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let peak_hours = ranked.into_iter().take(PEAK_HOURS).map(|(h, _)| h).collect();

        let mut stamps = points.iter().map(|p| p.timestamp);
        let first = stamps.next().ok_or_else(|| DetectionError::InsufficientData {
            context: format!("{} baseline data period", self.series),
            available: 0,
            required: 1,
        })?;
        let (start, end) = stamps.fold((first, first), |(lo, hi), ts| (lo.min(ts), hi.max(ts)));

        info!(
            "Built {} baseline for {} from {} points ({} hours observed)",
            self.series,
            month.map(|m| m.name()).unwrap_or("all months"),
            points.len(),
            by_hour.len()
        );

        Ok(BaselineProfile {
            series: self.series,
            month,
            generated_at: Utc::now(),
            data_period: DataPeriod {
                start,
                end,
                days: (end - start).num_days(),
            },
            overall,
            hourly,
            day_of_week,
            weekday: summarize(&weekday),
            weekend: summarize(&weekend),
            peak_hours,
        })
    }
}

/// Correlates price with demand over the hours both series cover.
///
/// Each series is averaged per local (date, hour) bucket, so five-minute
/// prices line up with hourly demand. `None` when fewer than two buckets
/// match or either side is constant.
pub fn price_demand_correlation(
    prices: &[TimeSeriesPoint],
    demand: &[TimeSeriesPoint],
) -> Option<PriceDemandCorrelation> {
    let demand_hours = hourly_means(demand);
    let (price, load): (Vec<f64>, Vec<f64>) = hourly_means(prices)
        .into_iter()
        .filter_map(|(bucket, price)| Some((price, *demand_hours.get(&bucket)?)))
        .unzip();

    if price.len() < 2 {
        warn!(
            "Could not calculate price-demand correlation: {} matching hours",
            price.len()
        );
        return None;
    }

    let covariance = statrs::statistics::Statistics::covariance(price.iter(), load.iter());
    let spread = statrs::statistics::Statistics::std_dev(price.iter())
        * statrs::statistics::Statistics::std_dev(load.iter());
    let correlation = covariance / spread;
    if !correlation.is_finite() {
        warn!("Price-demand correlation undefined: a series is constant over the matched hours");
        return None;
    }

    info!(
        "Price-demand correlation: {:.3} over {} hours",
        correlation,
        price.len()
    );
    Some(PriceDemandCorrelation {
        generated_at: Utc::now(),
        correlation,
        matched_hours: price.len(),
    })
}

fn hourly_means(points: &[TimeSeriesPoint]) -> BTreeMap<(NaiveDate, u32), f64> {
    let mut sums: BTreeMap<(NaiveDate, u32), (f64, usize)> = BTreeMap::new();
    for p in points {
        let bucket = sums
            .entry((p.timestamp.date_naive(), p.timestamp.hour()))
            .or_insert((0.0, 0));
        bucket.0 += p.value;
        bucket.1 += 1;
    }
    sums.into_iter()
        .map(|(key, (sum, n))| (key, sum / n as f64))
        .collect()
}

/// Distribution summary; `None` for an empty group.
fn summarize(values: &[f64]) -> Option<SummaryStats> {
    if values.is_empty() {
        return None;
    }
    let data = Data::new(values.to_vec());
    let mean = data.mean()?;
    let std = data.std_dev().filter(|s| s.is_finite()).unwrap_or(0.0);

    Some(SummaryStats {
        mean,
        std,
        min: data.min(),
        max: data.max(),
        median: percentile(values, 50.0),
        p25: percentile(values, 25.0),
        p75: percentile(values, 75.0),
        p95: percentile(values, 95.0),
        count: values.len(),
    })
}

#![allow(dead_code)]

use chrono::{Datelike, FixedOffset, TimeDelta, TimeZone, Timelike};
use gridsentry::application::ml::isolation_forest::IsolationForestParameters;
use gridsentry::application::ml::monthly_trainer::TrainerSettings;
use gridsentry::domain::types::{SeriesKind, TimeSeriesPoint, Timestamp};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Pacific standard offset, the grid's local time in these fixtures.
pub fn pacific() -> FixedOffset {
    FixedOffset::west_opt(8 * 3600).unwrap()
}

pub fn local(year: i32, month: u32, day: u32, hour: u32) -> Timestamp {
    pacific().with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap()
}

/// Noise-free demand: trough of 1900 MW around 03:00, peak of 2700 MW around
/// 15:00, weekends 5% lower.
pub fn expected_demand(ts: &Timestamp) -> f64 {
    let hour = ts.hour() as f64;
    let daily = 2300.0 - 400.0 * (2.0 * PI * (hour - 3.0) / 24.0).cos();
    if ts.weekday().num_days_from_monday() >= 5 {
        daily * 0.95
    } else {
        daily
    }
}

/// Hourly demand from `start` with up to 2% multiplicative noise.
pub fn hourly_demand(start: Timestamp, hours: usize, seed: u64) -> Vec<TimeSeriesPoint> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..hours)
        .map(|i| {
            let ts = start + TimeDelta::hours(i as i64);
            let noise: f64 = rng.random_range(-0.02..0.02);
            TimeSeriesPoint::new(ts, expected_demand(&ts) * (1.0 + noise))
        })
        .collect()
}

/// Hourly demand covering `[start, end)`.
pub fn hourly_demand_between(start: Timestamp, end: Timestamp, seed: u64) -> Vec<TimeSeriesPoint> {
    let hours = (end - start).num_hours().max(0) as usize;
    hourly_demand(start, hours, seed)
}

/// Demand trainer settings with a smaller forest to keep tests quick.
pub fn quick_settings() -> TrainerSettings {
    let mut settings = TrainerSettings::for_series(SeriesKind::Demand);
    settings.forest = IsolationForestParameters::default().with_n_estimators(100);
    settings
}
